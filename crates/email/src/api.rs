//! Provider wire types for the two supported transactional email services.

use serde::{Deserialize, Serialize};

// ── SendGrid ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SendgridMail<'a> {
    pub personalizations: Vec<Personalization<'a>>,
    pub from: EmailAddress<'a>,
    pub subject: &'a str,
    pub content: Vec<MailContent<'a>>,
}

#[derive(Debug, Serialize)]
pub struct Personalization<'a> {
    pub to: Vec<EmailAddress<'a>>,
}

#[derive(Debug, Serialize)]
pub struct EmailAddress<'a> {
    pub email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct MailContent<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub value: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct SendgridErrorBody {
    #[serde(default)]
    pub errors: Vec<SendgridError>,
}

#[derive(Debug, Deserialize)]
pub struct SendgridError {
    #[serde(default)]
    pub message: Option<String>,
}

// ── Resend ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ResendMail<'a> {
    /// `"Display Name <address>"` form.
    pub from: String,
    pub to: Vec<&'a str>,
    pub subject: &'a str,
    pub html: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ResendSent {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}
