//! Email delivery channel for dray.
//!
//! One [`EmailAdapter`] fronting two transactional providers (SendGrid and
//! Resend); the provider is chosen from config when the adapter is built.

pub mod adapter;
pub mod api;

pub use adapter::EmailAdapter;
