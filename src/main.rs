use std::io;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::debug;
use roboregistry::commands;
use roboregistry::config::{ClientConfig, DEFAULT_POLL_INTERVAL_MS};
use roboregistry::http::{DEFAULT_RETRY_DELAY_MS, DEFAULT_TEAM_API_URL, DEFAULT_TIMEOUT_MS};
use roboregistry::registry::{EventFlags, RegistryApi};
use tokio_util::sync::CancellationToken;

/// roboregistry - RoboRegistry API client
///
/// Fetches data from a RoboRegistry site and the FIRST team lookup service.
/// Requests retry until they succeed or the timeout passes; a request that
/// times out yields no data (`{}`) instead of an error.
///
/// Examples:
///   roboregistry --url https://roboregistry.example team 254
///   roboregistry --url https://roboregistry.example watch /api/registrations/EVENT
#[derive(Parser, Debug)]
#[command(author, version = env!("ROBOREGISTRY_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the RoboRegistry site that relative endpoints resolve against
    #[arg(long = "url", env = "ROBOREGISTRY_URL", value_name = "URL", global = true)]
    base_url: Option<String>,

    /// Base URL of the FIRST team lookup service
    #[arg(
        long = "team-api-url",
        env = "ROBOREGISTRY_TEAM_API_URL",
        value_name = "URL",
        default_value = DEFAULT_TEAM_API_URL,
        global = true
    )]
    team_api_url: String,

    /// Give up on a request after this many milliseconds
    #[arg(
        long = "timeout-ms",
        env = "ROBOREGISTRY_TIMEOUT_MS",
        value_name = "MS",
        default_value_t = DEFAULT_TIMEOUT_MS,
        global = true
    )]
    timeout_ms: u64,

    /// Wait this many milliseconds between attempts
    #[arg(
        long = "retry-delay-ms",
        env = "ROBOREGISTRY_RETRY_DELAY_MS",
        value_name = "MS",
        default_value_t = DEFAULT_RETRY_DELAY_MS,
        global = true
    )]
    retry_delay_ms: u64,

    /// Value of the logged-in `session` cookie
    #[arg(
        long = "session",
        env = "ROBOREGISTRY_SESSION",
        value_name = "COOKIE",
        hide_env_values = true,
        global = true
    )]
    session: Option<String>,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Fetch an endpoint and print its JSON
    Fetch(FetchArgs),

    /// Look up a FIRST team by number
    Team(TeamArgs),

    /// Show the dashboard of the logged-in user
    Dashboard,

    /// Show whether registration and check-in are open for an event
    Status(StatusArgs),

    /// Poll an endpoint and print its JSON whenever it changes
    Watch(WatchArgs),
}

#[derive(clap::Args, Debug)]
struct FetchArgs {
    /// Absolute URL or path such as /api/dashboard
    #[arg(value_name = "ENDPOINT")]
    endpoint: String,
}

#[derive(clap::Args, Debug)]
struct TeamArgs {
    /// Team number between 10 and 99999
    #[arg(value_name = "NUMBER")]
    number: String,
}

#[derive(clap::Args, Debug)]
struct StatusArgs {
    /// Event identifier
    #[arg(value_name = "EVENT_UID")]
    event_uid: String,

    /// The event is hidden from the public
    #[arg(long)]
    hidden: bool,

    /// Registration is switched off for the event
    #[arg(long)]
    no_registration: bool,

    /// Check-in is switched off for the event
    #[arg(long)]
    no_checkin: bool,
}

impl StatusArgs {
    fn flags(&self) -> EventFlags {
        EventFlags {
            visible: !self.hidden,
            registration_enabled: !self.no_registration,
            checkin_enabled: !self.no_checkin,
        }
    }
}

#[derive(clap::Args, Debug)]
struct WatchArgs {
    /// Absolute URL or path such as /api/registrations/EVENT_UID
    #[arg(value_name = "ENDPOINT")]
    endpoint: String,

    /// Milliseconds between polls
    #[arg(long = "interval-ms", value_name = "MS", default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    interval_ms: u64,

    /// Stop after printing this many changes
    #[arg(long, value_name = "N")]
    count: Option<usize>,
}

impl Cli {
    fn config(&self) -> ClientConfig {
        let mut config = ClientConfig {
            base_url: self.base_url.clone(),
            team_api_url: self.team_api_url.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            session_cookie: self.session.clone(),
            ..Default::default()
        };
        if let Commands::Watch(args) = &self.command {
            config.poll_interval = Duration::from_millis(args.interval_ms);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = cli.config();
    let client = config.build_client()?;
    let mut out = io::stdout().lock();

    match &cli.command {
        Commands::Fetch(args) => commands::fetch(client.as_ref(), &args.endpoint, &mut out).await?,
        Commands::Team(args) => {
            let api = RegistryApi::new(client);
            commands::team(&api, &args.number, &mut out).await?
        }
        Commands::Dashboard => {
            let api = RegistryApi::new(client);
            commands::dashboard(&api, &mut out).await?
        }
        Commands::Status(args) => {
            let api = RegistryApi::new(client);
            commands::status(&api, &args.event_uid, args.flags(), &mut out).await?
        }
        Commands::Watch(args) => {
            let stop = CancellationToken::new();
            tokio::spawn({
                let stop = stop.clone();
                async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        debug!("Interrupted, stopping");
                        stop.cancel();
                    }
                }
            });
            commands::watch(
                client,
                &args.endpoint,
                config.poll_interval,
                args.count,
                &stop,
                &mut out,
            )
            .await?
        }
    }
    Ok(())
}
