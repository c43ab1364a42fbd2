//! HTTP boundary of the Keyhole URL shortener.
//!
//! Validates requests, extracts the owner and maps resolver errors to HTTP
//! statuses. Everything else is delegated to a [`keyhole_resolver::Resolver`].

pub mod app;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod model;
pub mod state;
pub mod validate;

pub use app::App;
pub use error::GatewayError;
pub use state::AppState;
