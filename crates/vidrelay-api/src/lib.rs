//! Vidrelay API Library
//!
//! HTTP handlers, application state and setup for the relay service.

mod api_doc;
mod handlers;
mod telemetry;

pub mod error;
pub mod setup;
pub mod state;

pub use api_doc::get_openapi_spec;
pub use error::{ErrorResponse, HttpAppError};
