//! Shared types, error definitions, and utilities used across all dray crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, FromMessage, Result},
    types::{
        ChannelType, Dispatch, DispatchRequest, DispatchStatus, Driver, Route, Stop, Vehicle,
    },
};
