//! Entry points used by the CLI.
//!
//! - `run_update`: Fetch every source once under a deadline
//! - `run_watch`: Run the batch scheduler until interrupted
//! - `run_validate`: Check a configuration file

pub mod update;
pub mod validate;
pub mod watch;

pub use update::run_update;
pub use validate::run_validate;
pub use watch::run_watch;
