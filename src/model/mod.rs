//! Domain model types (pure).
//!
//! All types in this module are plain data: no I/O, no timers, no shared state.

pub mod app_state;
pub mod error;
pub mod page_kind;
pub mod transition;
pub mod voucher;

// Re-export for convenience
pub use app_state::{ApplicationState, ErrorRecord};
pub use error::{FetchError, InitError, StoreError, SubscriberError, TransportError};
pub use page_kind::PageKind;
pub use transition::{NavigationTrigger, RouteTransition};
pub use voucher::{BalanceSummary, PackageDefinition, PackageTotal, WalletRecord, BALANCE_DIVISOR};
