//! HTTP surface of the ledger.
//!
//! Routes are nested under `/api/`. Handlers are thin: they parse ids,
//! hand a closure to [`ApiContext::run`] and map the domain error to a
//! status code. The router is composable (`api_router()` returns a
//! `Router` that can be mounted on any axum server).

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer};
pub use types::ApiContext;
