//! Voucher Lens
//!
//! Overlay engine for the SiliconFlow cloud console. On the expense bill page
//! it sums the account's voucher balances into a panel; on the model catalog
//! it marks the models that voucher packages cover.
//!
//! The engine never touches a browser directly. The host supplies the page,
//! history, renderer, card lookup, storage and HTTP transport through the
//! traits in [`host`] and [`gateway`]; everything else is plain state driven
//! from a single-threaded `tokio` `LocalSet`.

pub mod cache;
pub mod config;
pub mod gateway;
pub mod host;
pub mod logging;
pub mod model;
pub mod navigation;
pub mod orchestrator;
pub mod route;
pub mod support;

// Re-export engine wiring
pub mod integration;

pub use integration::{assemble, bootstrap, BootstrapError, Engine, HostCollaborators};
pub use model::PageKind;

#[cfg(test)]
mod test_harness;

#[cfg(test)]
mod tests;
