//! EduConnect server: wires configuration, storage, media, notifications and
//! authentication into the HTTP application and runs it.

pub mod bootstrap;
pub mod runtime;

pub use bootstrap::{build_state, run, run_with_listener};
pub use edu_api::{build_app, build_app_with_timeout, AppState};
pub use edu_models::{Config, EduError};
pub use runtime::{build_runtime, shutdown_signal};
