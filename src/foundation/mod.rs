/// Serde-loadable cache and decoder configuration.
pub mod config;
/// Exact rationals and integer timestamp arithmetic.
pub mod core;
/// Error taxonomy shared by every component.
pub mod error;
/// Pluggable log sink with a `tracing` default.
pub mod log;
