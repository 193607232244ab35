//! Bot API wire types, limited to the calls dispatch makes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct SendMessage<'a> {
    pub chat_id: &'a str,
    pub text: &'a str,
    pub parse_mode: &'a str,
    pub reply_markup: ReplyMarkup,
}

#[derive(Debug, Serialize)]
pub struct ReplyMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

/// Every Bot API response, success or failure, arrives in this envelope.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub ok: bool,
    #[serde(default)]
    pub result: Option<T>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
}

/// `getMe` result subset.
#[derive(Debug, Default, Deserialize)]
pub struct BotProfile {
    #[serde(default)]
    pub username: Option<String>,
}
