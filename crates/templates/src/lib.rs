//! Channel message rendering for dray.
//!
//! [`TemplateEngine`] turns a per-channel template file plus a JSON context
//! into the message body an adapter delivers. [`build_context`] assembles
//! that context from the route, driver, vehicle, and stop records.

pub mod context;
pub mod engine;
pub mod error;

pub use {
    context::build_context,
    engine::{TemplateEngine, sanitize},
    error::{Error, Result},
};
