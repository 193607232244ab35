use std::path::PathBuf;

use dray_common::ChannelType;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    /// No template file is mapped to this channel at all. Distinct from a
    /// mapped file that is missing on disk.
    #[error("no template configured for channel: {0}")]
    NoTemplateForChannel(ChannelType),

    #[error("template not found: {name} ({})", path.display())]
    TemplateMissing { name: String, path: PathBuf },

    #[error("template {name} is malformed: {message}")]
    Malformed { name: String, message: String },
}

impl Error {
    #[must_use]
    pub fn malformed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed { name: name.into(), message: message.into() }
    }
}

impl dray_common::FromMessage for Error {
    fn from_message(msg: String) -> Self {
        Self::Message(msg)
    }
}

dray_common::impl_context!();
