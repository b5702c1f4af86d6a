pub mod config;
pub mod constants;
pub mod error;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod server;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;

// Messages shared across layers
pub mod domain;

pub mod native;
pub mod queue;

#[cfg(test)]
pub(crate) mod test_support;
