// Library crate for integration tests.
// main.rs has its own mod declarations; this re-exports all modules.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod orchestrator;
pub mod poller;
pub mod session;
pub mod transport;
