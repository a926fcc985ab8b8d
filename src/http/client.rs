//! JSON fetch client with an overall deadline, retry-until-deadline and
//! single-flight cancellation.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use super::retry::{Disposition, FetchError, RetryPolicy, classify};
use super::transport::{ReqwestTransport, Transport};

/// Base URL of the public FIRST team lookup service.
pub const DEFAULT_TEAM_API_URL: &str = "https://firstteamapi.vercel.app";

/// How a fetch ended. Failures never surface as errors.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T = Value> {
    /// The body decoded successfully.
    Data(T),
    /// Nothing decoded before the deadline.
    TimedOut,
    /// The request was superseded by [`ResilientClient::abort_current_request`].
    Cancelled,
}

impl<T> FetchOutcome<T> {
    pub fn data(self) -> Option<T> {
        match self {
            FetchOutcome::Data(data) => Some(data),
            FetchOutcome::TimedOut | FetchOutcome::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchOutcome::Cancelled)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchOutcome<U> {
        match self {
            FetchOutcome::Data(data) => FetchOutcome::Data(f(data)),
            FetchOutcome::TimedOut => FetchOutcome::TimedOut,
            FetchOutcome::Cancelled => FetchOutcome::Cancelled,
        }
    }
}

impl FetchOutcome<Value> {
    /// Collapses the outcome into "data or empty object".
    ///
    /// A timeout becomes `{}`, which callers read as "no data available".
    /// A cancelled request has nobody left to hand data to and yields `None`.
    pub fn into_json(self) -> Option<Value> {
        match self {
            FetchOutcome::Data(value) => Some(value),
            FetchOutcome::TimedOut => Some(Value::Object(Map::new())),
            FetchOutcome::Cancelled => None,
        }
    }
}

/// HTTP GET client that keeps retrying until the body decodes or the
/// deadline passes.
///
/// The client owns exactly one active cancellation token. Every request
/// binds to the token that is current when it starts; aborting cancels that
/// token and installs a fresh one, so superseded requests stop while new
/// ones proceed. Construct one per application and share it behind an `Arc`.
pub struct ResilientClient<T: Transport = ReqwestTransport> {
    transport: T,
    policy: RetryPolicy,
    base_url: Option<String>,
    team_api_url: String,
    token: Mutex<CancellationToken>,
}

impl<T: Transport> ResilientClient<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            base_url: None,
            team_api_url: DEFAULT_TEAM_API_URL.to_string(),
            token: Mutex::new(CancellationToken::new()),
        }
    }

    /// Sets the origin that relative endpoints such as `/api/dashboard` are
    /// resolved against.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_team_api_url(mut self, team_api_url: impl Into<String>) -> Self {
        self.team_api_url = team_api_url.into();
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Turns an endpoint into the URL that is actually requested.
    ///
    /// Absolute URLs pass through untouched. Relative ones are joined onto
    /// the base URL, or passed through as-is when there is none (the
    /// transport then fails and the request is retried like any other
    /// failure).
    pub fn resolve(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                endpoint.trim_start_matches('/')
            ),
            None => endpoint.to_string(),
        }
    }

    fn current_token(&self) -> CancellationToken {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Cancels every request bound to the current token and issues a fresh
    /// one for later requests. Safe to call with nothing in flight.
    pub fn abort_current_request(&self) {
        let previous = {
            let mut token = self.token.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *token, CancellationToken::new())
        };
        previous.cancel();
        debug!("Aborted current request generation");
    }

    /// Fetches `endpoint` and decodes it as arbitrary JSON.
    pub async fn fetch_json(&self, endpoint: &str) -> FetchOutcome<Value> {
        self.fetch(endpoint).await
    }

    /// Fetches `endpoint` and decodes it into `D`.
    ///
    /// A body that does not decode into `D` counts as a failed attempt and is
    /// retried after the backoff delay. The whole call is bounded by the
    /// policy timeout no matter how many attempts it takes.
    #[tracing::instrument(skip(self))]
    pub async fn fetch<D>(&self, endpoint: &str) -> FetchOutcome<D>
    where
        D: DeserializeOwned + Send,
    {
        let url = self.resolve(endpoint);
        let token = self.current_token();
        debug!("GET JSON from {}...", url);

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Request to '{}' was cancelled", url);
                FetchOutcome::Cancelled
            }
            outcome = self.retry_until_decoded(&url, &token) => outcome,
            _ = tokio::time::sleep(self.policy.timeout) => {
                warn!(
                    "Request to '{}' timed out after {}ms",
                    url,
                    self.policy.timeout.as_millis()
                );
                FetchOutcome::TimedOut
            }
        }
    }

    /// Looks up a FIRST team through the team lookup service.
    pub async fn fetch_team_data(&self, identifier: impl fmt::Display) -> FetchOutcome<Value> {
        let url = format!(
            "{}/get_team/{}",
            self.team_api_url.trim_end_matches('/'),
            identifier
        );
        self.fetch_json(&url).await
    }

    async fn retry_until_decoded<D>(&self, url: &str, token: &CancellationToken) -> FetchOutcome<D>
    where
        D: DeserializeOwned + Send,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let error = match self.attempt(url, token).await {
                Ok(data) => return FetchOutcome::Data(data),
                Err(e) => e,
            };

            if classify(&error) == Disposition::Abandon {
                debug!("Request to '{}' abandoned on attempt {}", url, attempt);
                return FetchOutcome::Cancelled;
            }

            warn!(
                "Could not fetch '{}' (attempt {}): {}. Retrying in {}ms...",
                url,
                attempt,
                error,
                self.policy.retry_delay.as_millis()
            );
            tokio::time::sleep(self.policy.retry_delay).await;
        }
    }

    async fn attempt<D: DeserializeOwned>(
        &self,
        url: &str,
        token: &CancellationToken,
    ) -> Result<D, FetchError> {
        let body = self.transport.get(url, token).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::transport::MockTransport;
    use async_trait::async_trait;
    use bytes::Bytes;
    use serde_json::json;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Clone)]
    enum Step {
        Body(&'static str),
        Fail,
        Hang,
    }

    /// Replays a per-URL script of responses and records when each call
    /// happened. The last step of a script repeats forever.
    #[derive(Default)]
    struct ScriptedTransport {
        scripts: Mutex<HashMap<String, VecDeque<Step>>>,
        calls: Mutex<Vec<(String, Instant)>>,
    }

    impl ScriptedTransport {
        fn script(self, url: &str, steps: &[Step]) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(url.to_string(), steps.iter().cloned().collect());
            self
        }

        fn calls_to(&self, url: &str) -> Vec<Instant> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(u, _)| u == url)
                .map(|(_, at)| *at)
                .collect()
        }

        fn next_step(&self, url: &str) -> Step {
            let mut scripts = self.scripts.lock().unwrap();
            let steps = scripts.get_mut(url).expect("unscripted url");
            if steps.len() > 1 {
                steps.pop_front().unwrap()
            } else {
                steps.front().cloned().unwrap()
            }
        }
    }

    #[async_trait]
    impl Transport for Arc<ScriptedTransport> {
        async fn get(&self, url: &str, cancel: &CancellationToken) -> Result<Bytes, FetchError> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), Instant::now()));
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            match self.next_step(url) {
                Step::Body(body) => Ok(Bytes::from_static(body.as_bytes())),
                Step::Fail => Err(FetchError::Other("connection reset".to_string())),
                Step::Hang => {
                    cancel.cancelled().await;
                    Err(FetchError::Cancelled)
                }
            }
        }
    }

    type ScriptedClient = ResilientClient<Arc<ScriptedTransport>>;

    fn scripted(transport: ScriptedTransport) -> (Arc<ScriptedTransport>, ScriptedClient) {
        let transport = Arc::new(transport);
        let client = ResilientClient::new(transport.clone(), RetryPolicy::default());
        (transport, client)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_json_success_first_try() {
        let (transport, client) =
            scripted(ScriptedTransport::default().script("/a", &[Step::Body(r#"{"ok": true}"#)]));

        let outcome = client.fetch_json("/a").await;

        assert_eq!(outcome, FetchOutcome::Data(json!({"ok": true})));
        assert_eq!(transport.calls_to("/a").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_json_retries_malformed_bodies() {
        let (transport, client) = scripted(ScriptedTransport::default().script(
            "/a",
            &[
                Step::Body("<html>"),
                Step::Body("{\"trunc"),
                Step::Body(""),
                Step::Body(r#"[1, 2, 3]"#),
            ],
        ));

        let outcome = client.fetch_json("/a").await;

        assert_eq!(outcome, FetchOutcome::Data(json!([1, 2, 3])));
        let calls = transport.calls_to("/a");
        assert_eq!(calls.len(), 4);
        for pair in calls.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_json_retries_transport_failures() {
        let (transport, client) = scripted(
            ScriptedTransport::default()
                .script("/a", &[Step::Fail, Step::Fail, Step::Body(r#""done""#)]),
        );

        let outcome = client.fetch_json("/a").await;

        assert_eq!(outcome, FetchOutcome::Data(json!("done")));
        assert_eq!(transport.calls_to("/a").len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_json_times_out_with_empty_object() {
        let (transport, client) =
            scripted(ScriptedTransport::default().script("/a", &[Step::Body("not json")]));

        let started = Instant::now();
        let outcome = client.fetch_json("/a").await;

        assert_eq!(outcome, FetchOutcome::TimedOut);
        assert_eq!(outcome.into_json(), Some(json!({})));
        assert!(started.elapsed() >= Duration::from_millis(15_000));

        let calls_at_timeout = transport.calls_to("/a").len();
        assert!(calls_at_timeout > 1);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.calls_to("/a").len(), calls_at_timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_configurable() {
        let transport = Arc::new(ScriptedTransport::default().script("/a", &[Step::Fail]));
        let client = ResilientClient::new(
            transport.clone(),
            RetryPolicy::new(Duration::from_millis(1_000), Duration::from_millis(300)),
        );

        let started = Instant::now();
        assert_eq!(client.fetch_json("/a").await, FetchOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_millis(1_100));
        // Attempts at 0, 300, 600 and 900ms.
        assert_eq!(transport.calls_to("/a").len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_while_pending_cancels_and_next_fetch_succeeds() {
        let (transport, client) = scripted(
            ScriptedTransport::default()
                .script("/slow", &[Step::Hang])
                .script("/fast", &[Step::Body(r#"{"n": 1}"#)]),
        );
        let client = Arc::new(client);

        let pending = tokio::spawn({
            let client = client.clone();
            async move { client.fetch_json("/slow").await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.calls_to("/slow").len(), 1);

        client.abort_current_request();

        assert_eq!(pending.await.unwrap(), FetchOutcome::Cancelled);
        assert_eq!(
            client.fetch_json("/fast").await,
            FetchOutcome::Data(json!({"n": 1}))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_during_backoff_stops_retrying() {
        let (transport, client) =
            scripted(ScriptedTransport::default().script("/a", &[Step::Fail]));
        let client = Arc::new(client);

        let pending = tokio::spawn({
            let client = client.clone();
            async move { client.fetch_json("/a").await }
        });
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        let calls_before_abort = transport.calls_to("/a").len();
        assert_eq!(calls_before_abort, 3);

        client.abort_current_request();

        assert_eq!(pending.await.unwrap(), FetchOutcome::Cancelled);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(transport.calls_to("/a").len(), calls_before_abort);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_with_nothing_pending_is_noop() {
        let (_transport, client) =
            scripted(ScriptedTransport::default().script("/a", &[Step::Body("{}")]));

        let before = client.current_token();
        client.abort_current_request();
        client.abort_current_request();

        assert!(before.is_cancelled());
        assert!(!client.current_token().is_cancelled());
        assert_eq!(client.fetch_json("/a").await, FetchOutcome::Data(json!({})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_fetch_does_not_cancel_previous() {
        let (_transport, client) = scripted(
            ScriptedTransport::default()
                .script("/a", &[Step::Fail, Step::Fail, Step::Body(r#""a""#)])
                .script("/b", &[Step::Body("oops"), Step::Body(r#""b""#)]),
        );

        let (a, b) = tokio::join!(client.fetch_json("/a"), client.fetch_json("/b"));

        assert_eq!(a, FetchOutcome::Data(json!("a")));
        assert_eq!(b, FetchOutcome::Data(json!("b")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_of_one_fetch_leaves_others_running() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .script("/dead", &[Step::Fail])
                .script("/late", &[Step::Fail, Step::Body(r#""late""#)]),
        );
        let client = Arc::new(ResilientClient::new(
            transport.clone(),
            RetryPolicy::new(Duration::from_millis(600), Duration::from_millis(500)),
        ));

        let late = tokio::spawn({
            let client = client.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                client.fetch_json("/late").await
            }
        });

        // "/dead" gives up at 600ms while "/late" sits in its backoff until 800ms.
        assert_eq!(client.fetch_json("/dead").await, FetchOutcome::TimedOut);
        assert_eq!(late.await.unwrap(), FetchOutcome::Data(json!("late")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_typed_fetch_retries_shape_mismatch() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Status {
            can_register: bool,
        }

        let (transport, client) = scripted(ScriptedTransport::default().script(
            "/a",
            &[Step::Body(r#"{"error": "busy"}"#), Step::Body(r#"{"can_register": true}"#)],
        ));

        let outcome: FetchOutcome<Status> = client.fetch("/a").await;

        assert_eq!(outcome, FetchOutcome::Data(Status { can_register: true }));
        assert_eq!(transport.calls_to("/a").len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_team_data_targets_lookup_endpoint() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .withf(|url, _| url == "https://firstteamapi.vercel.app/get_team/1234")
            .times(1)
            .returning(|_, _| Ok(Bytes::from_static(br#"{"valid": false}"#)));

        let client = ResilientClient::new(transport, RetryPolicy::default());
        let outcome = client.fetch_team_data(1234).await;

        assert_eq!(outcome, FetchOutcome::Data(json!({"valid": false})));
    }

    #[tokio::test]
    async fn test_fetch_team_data_custom_api_url() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .withf(|url, _| url == "http://localhost:9000/get_team/254")
            .times(1)
            .returning(|_, _| Ok(Bytes::from_static(br#"{"valid": true, "data": []}"#)));

        let client = ResilientClient::new(transport, RetryPolicy::default())
            .with_team_api_url("http://localhost:9000/");
        let outcome = client.fetch_team_data("254").await;

        assert_eq!(outcome, FetchOutcome::Data(json!({"valid": true, "data": []})));
    }

    #[test_log::test(tokio::test)]
    async fn test_fetch_json_against_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/is_auto_open/abc")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"can_register": true, "can_checkin": false}"#)
            .create_async()
            .await;

        let client = ResilientClient::new(
            ReqwestTransport::new(reqwest::Client::new()),
            RetryPolicy::default(),
        )
        .with_base_url(server.url());
        let outcome = client.fetch_json("/api/is_auto_open/abc").await;

        mock.assert_async().await;
        assert_eq!(
            outcome,
            FetchOutcome::Data(json!({"can_register": true, "can_checkin": false}))
        );
    }

    #[test]
    fn test_resolve() {
        let client = ResilientClient::new(MockTransport::new(), RetryPolicy::default());
        assert_eq!(client.resolve("/api/dashboard"), "/api/dashboard");
        assert_eq!(
            client.resolve("https://example.com/x"),
            "https://example.com/x"
        );

        let client = client.with_base_url("http://localhost:5000/");
        assert_eq!(
            client.resolve("/api/dashboard"),
            "http://localhost:5000/api/dashboard"
        );
        assert_eq!(
            client.resolve("api/dashboard"),
            "http://localhost:5000/api/dashboard"
        );
        assert_eq!(client.resolve("http://other/x"), "http://other/x");
    }

    #[test]
    fn test_into_json() {
        assert_eq!(
            FetchOutcome::Data(json!([1])).into_json(),
            Some(json!([1]))
        );
        assert_eq!(FetchOutcome::TimedOut.into_json(), Some(json!({})));
        assert_eq!(FetchOutcome::Cancelled.into_json(), None);
    }

    #[test]
    fn test_outcome_map_and_data() {
        let outcome: FetchOutcome<u32> = FetchOutcome::Data(2);
        assert_eq!(outcome.map(|n| n * 2).data(), Some(4));
        assert!(FetchOutcome::<u32>::Cancelled.is_cancelled());
        assert_eq!(FetchOutcome::<u32>::TimedOut.data(), None);
    }
}
