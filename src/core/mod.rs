pub mod config;
pub(crate) mod metrics;
pub(crate) mod shutdown;
pub mod state;
pub mod telemetry;
pub(crate) mod time;
