//! Telegram delivery channel for dray.
//!
//! Implements [`dray_channels::ChannelAdapter`] against the Telegram Bot API
//! over plain HTTP. Messages go out as Markdown with an inline
//! acknowledgement button; `getMe` backs the health probe.

pub mod adapter;
pub mod api;

pub use adapter::TelegramAdapter;
