use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::ExposeSecret,
    tracing::{debug, warn},
};

use {
    dray_channels::{ChannelAdapter, ChannelResult, DispatchContext, HealthStatus},
    dray_common::{ChannelType, Driver},
    dray_config::TelegramChannelConfig,
};

use crate::api::{
    ApiEnvelope, BotProfile, InlineKeyboardButton, ReplyMarkup, SendMessage, SentMessage,
};

const ACK_BUTTON_LABEL: &str = "✅ Acknowledge Receipt";

/// Delivers route assignments as Telegram bot messages.
///
/// Talks to the Bot API directly over HTTP so the API origin can be pointed
/// at a mock server in tests. Every message carries one inline keyboard
/// button whose callback data (`ack:{dispatch_id}`) lets the bot attribute
/// the driver's acknowledgement tap back to the dispatch.
pub struct TelegramAdapter {
    config: TelegramChannelConfig,
    http: reqwest::Client,
}

impl TelegramAdapter {
    #[must_use]
    pub fn new(config: TelegramChannelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.config.api_base.trim_end_matches('/'),
            self.config.token.expose_secret(),
        )
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }
}

fn trimmed_chat_id(driver: &Driver) -> Option<&str> {
    driver
        .chat_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

#[async_trait]
impl ChannelAdapter for TelegramAdapter {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Telegram
    }

    fn can_send(&self, driver: &Driver) -> bool {
        trimmed_chat_id(driver).is_some()
    }

    async fn send(&self, ctx: DispatchContext<'_>) -> ChannelResult {
        let channel = ChannelType::Telegram;
        if !self.config.is_configured() {
            return ChannelResult::failed(channel, "telegram bot token not configured");
        }
        let Some(chat_id) = trimmed_chat_id(ctx.driver) else {
            return ChannelResult::failed(channel, "driver has no telegram chat id");
        };

        let payload = SendMessage {
            chat_id,
            text: ctx.message,
            parse_mode: "Markdown",
            reply_markup: ReplyMarkup {
                inline_keyboard: vec![vec![InlineKeyboardButton {
                    text: ACK_BUTTON_LABEL.to_string(),
                    callback_data: format!("ack:{}", ctx.dispatch.id),
                }]],
            },
        };

        let response = match self
            .http
            .post(self.method_url("sendMessage"))
            .timeout(self.timeout())
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(driver_id = %ctx.driver.id, error = %err, "telegram send failed in transport");
                return ChannelResult::failed(channel, format!("transport error: {err}"));
            }
        };

        match response.json::<ApiEnvelope<SentMessage>>().await {
            Ok(envelope) if envelope.ok => {
                let message_id = envelope.result.map(|sent| sent.message_id.to_string());
                debug!(
                    driver_id = %ctx.driver.id,
                    message_id = message_id.as_deref().unwrap_or(""),
                    "telegram message sent"
                );
                ChannelResult::delivered(channel, message_id)
            }
            Ok(envelope) => {
                let error = match (envelope.description, envelope.error_code) {
                    (Some(description), _) => description,
                    (None, Some(code)) => format!("telegram API error (code {code})"),
                    (None, None) => "telegram API error".to_string(),
                };
                warn!(driver_id = %ctx.driver.id, error = %error, "telegram rejected message");
                ChannelResult::failed(channel, error)
            }
            Err(err) => ChannelResult::failed(channel, format!("transport error: {err}")),
        }
    }

    async fn health_check(&self) -> HealthStatus {
        if !self.config.is_configured() {
            return HealthStatus::down("telegram bot token not configured");
        }

        let response = match self
            .http
            .get(self.method_url("getMe"))
            .timeout(self.timeout())
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return HealthStatus::down(format!("transport error: {err}")),
        };

        match response.json::<ApiEnvelope<BotProfile>>().await {
            Ok(envelope) if envelope.ok => {
                let username = envelope
                    .result
                    .and_then(|profile| profile.username)
                    .unwrap_or_else(|| "unknown".to_string());
                HealthStatus::up(format!("connected as @{username}"))
            }
            Ok(envelope) => HealthStatus::down(
                envelope
                    .description
                    .unwrap_or_else(|| "getMe failed".to_string()),
            ),
            Err(err) => HealthStatus::down(format!("transport error: {err}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {
        dray_common::{Dispatch, DispatchRequest, Route},
        mockito::Matcher,
        serde_json::json,
        uuid::Uuid,
    };

    use super::*;

    fn config(api_base: &str) -> TelegramChannelConfig {
        TelegramChannelConfig {
            token: secrecy::Secret::new("TEST_TOKEN".into()),
            api_base: api_base.into(),
            timeout_secs: 2,
        }
    }

    fn driver(chat_id: Option<&str>) -> Driver {
        Driver {
            id: "d1".into(),
            first_name: "Maria".into(),
            last_name: "Silva".into(),
            email: None,
            chat_id: chat_id.map(Into::into),
            preferred_channel: None,
            fallback_enabled: true,
        }
    }

    fn route() -> Route {
        Route {
            id: "r1".into(),
            name: "North Loop".into(),
            code: None,
            date: "2026-03-15".into(),
            planned_start_time: None,
            planned_end_time: None,
            total_stops: 0,
            total_distance_km: None,
            total_duration_minutes: None,
            vehicle_id: None,
            driver_id: None,
        }
    }

    fn dispatch() -> Dispatch {
        let mut dispatch = Dispatch::new(DispatchRequest {
            route_id: "r1".into(),
            driver_id: "d1".into(),
            channels: None,
            multi_channel: None,
            metadata: None,
        });
        dispatch.id = Uuid::nil();
        dispatch
    }

    fn ctx<'a>(
        dispatch: &'a Dispatch,
        driver: &'a Driver,
        route: &'a Route,
        message: &'a str,
    ) -> DispatchContext<'a> {
        DispatchContext {
            dispatch,
            driver,
            route,
            vehicle: None,
            stops: &[],
            message,
        }
    }

    #[tokio::test]
    async fn send_posts_markdown_with_ack_button() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/botTEST_TOKEN/sendMessage")
            .match_body(Matcher::PartialJson(json!({
                "chat_id": "12345",
                "text": "hello",
                "parse_mode": "Markdown",
                "reply_markup": {
                    "inline_keyboard": [[{
                        "text": "✅ Acknowledge Receipt",
                        "callback_data": "ack:00000000-0000-0000-0000-000000000000",
                    }]],
                },
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"result":{"message_id":421}}"#)
            .create_async()
            .await;

        let adapter = TelegramAdapter::new(config(&server.url()));
        let dispatch = dispatch();
        let driver = driver(Some("12345"));
        let route = route();
        let result = adapter.send(ctx(&dispatch, &driver, &route, "hello")).await;

        assert!(result.success);
        assert_eq!(result.provider_message_id.as_deref(), Some("421"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejection_surfaces_api_description() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/botTEST_TOKEN/sendMessage")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#)
            .create_async()
            .await;

        let adapter = TelegramAdapter::new(config(&server.url()));
        let dispatch = dispatch();
        let driver = driver(Some("12345"));
        let route = route();
        let result = adapter.send(ctx(&dispatch, &driver, &route, "hello")).await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Bad Request: chat not found"));
    }

    #[tokio::test]
    async fn rejection_without_description_uses_error_code() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/botTEST_TOKEN/sendMessage")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":false,"error_code":401}"#)
            .create_async()
            .await;

        let adapter = TelegramAdapter::new(config(&server.url()));
        let dispatch = dispatch();
        let driver = driver(Some("12345"));
        let route = route();
        let result = adapter.send(ctx(&dispatch, &driver, &route, "hello")).await;

        assert_eq!(result.error.as_deref(), Some("telegram API error (code 401)"));
    }

    #[tokio::test]
    async fn non_json_body_reports_transport_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/botTEST_TOKEN/sendMessage")
            .with_status(502)
            .with_body("<html>bad gateway</html>")
            .create_async()
            .await;

        let adapter = TelegramAdapter::new(config(&server.url()));
        let dispatch = dispatch();
        let driver = driver(Some("12345"));
        let route = route();
        let result = adapter.send(ctx(&dispatch, &driver, &route, "hello")).await;

        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("transport error: "));
    }

    #[tokio::test]
    async fn unconfigured_token_fails_before_any_request() {
        let adapter = TelegramAdapter::new(TelegramChannelConfig::default());
        let dispatch = dispatch();
        let driver = driver(Some("12345"));
        let route = route();
        let result = adapter.send(ctx(&dispatch, &driver, &route, "hello")).await;

        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("telegram bot token not configured")
        );
    }

    #[tokio::test]
    async fn missing_chat_id_fails_before_any_request() {
        let adapter = TelegramAdapter::new(config("http://127.0.0.1:9"));
        assert!(!adapter.can_send(&driver(None)));
        assert!(!adapter.can_send(&driver(Some("  "))));

        let dispatch = dispatch();
        let driver = driver(None);
        let route = route();
        let result = adapter.send(ctx(&dispatch, &driver, &route, "hello")).await;
        assert_eq!(result.error.as_deref(), Some("driver has no telegram chat id"));
    }

    #[tokio::test]
    async fn health_reports_bot_username() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/botTEST_TOKEN/getMe")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"result":{"id":7,"is_bot":true,"first_name":"Dray","username":"dray_bot"}}"#)
            .create_async()
            .await;

        let adapter = TelegramAdapter::new(config(&server.url()));
        let status = adapter.health_check().await;

        assert!(status.healthy);
        assert_eq!(status.message.as_deref(), Some("connected as @dray_bot"));
    }

    #[tokio::test]
    async fn health_surfaces_rejection_description() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/botTEST_TOKEN/getMe")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#)
            .create_async()
            .await;

        let adapter = TelegramAdapter::new(config(&server.url()));
        let status = adapter.health_check().await;

        assert!(!status.healthy);
        assert_eq!(status.message.as_deref(), Some("Unauthorized"));
    }

    #[tokio::test]
    async fn health_when_unconfigured_says_so_without_io() {
        let adapter = TelegramAdapter::new(TelegramChannelConfig::default());
        let status = adapter.health_check().await;

        assert!(!status.healthy);
        assert!(status.message.unwrap().contains("not configured"));
    }
}
