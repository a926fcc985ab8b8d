//! Subcommands of the `roboregistry` binary.
//!
//! Each command writes its report to the given writer so it can be checked
//! in tests; `main` passes stdout.

mod dashboard;
mod fetch;
mod status;
mod team;
mod watch;

pub use dashboard::dashboard;
pub use fetch::fetch;
pub use status::status;
pub use team::team;
pub use watch::watch;
