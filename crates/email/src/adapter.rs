use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::ExposeSecret,
    tracing::{debug, warn},
};

use {
    dray_channels::{ChannelAdapter, ChannelResult, DispatchContext, HealthStatus},
    dray_common::{ChannelType, Driver, Route},
    dray_config::{EmailChannelConfig, EmailProvider},
};

use crate::api::{
    EmailAddress, MailContent, Personalization, ResendErrorBody, ResendMail, ResendSent,
    SendgridErrorBody, SendgridMail,
};

/// Delivers route assignments as transactional email.
///
/// One adapter serves both supported providers; which one is fixed at
/// construction from config, never per call. The rendered HTML body goes out
/// verbatim.
pub struct EmailAdapter {
    config: EmailChannelConfig,
    http: reqwest::Client,
}

impl EmailAdapter {
    #[must_use]
    pub fn new(config: EmailChannelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base().trim_end_matches('/'))
    }

    async fn send_sendgrid(&self, to: &str, subject: &str, html: &str) -> ChannelResult {
        let channel = ChannelType::Email;
        let payload = SendgridMail {
            personalizations: vec![Personalization {
                to: vec![EmailAddress {
                    email: to,
                    name: None,
                }],
            }],
            from: EmailAddress {
                email: &self.config.from_email,
                name: Some(&self.config.from_name),
            },
            subject,
            content: vec![MailContent {
                kind: "text/html",
                value: html,
            }],
        };

        let response = match self
            .http
            .post(self.api_url("/v3/mail/send"))
            .bearer_auth(self.config.api_key.expose_secret())
            .timeout(self.timeout())
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return ChannelResult::failed(channel, format!("transport error: {err}")),
        };

        let status = response.status();
        if status.is_success() {
            let message_id = response
                .headers()
                .get("x-message-id")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            debug!(to, message_id = message_id.as_deref().unwrap_or(""), "sendgrid accepted mail");
            return ChannelResult::delivered(channel, message_id);
        }

        let error = match response.json::<SendgridErrorBody>().await {
            Ok(body) => {
                let messages: Vec<String> =
                    body.errors.into_iter().filter_map(|e| e.message).collect();
                if messages.is_empty() {
                    format!("sendgrid error (status {})", status.as_u16())
                } else {
                    messages.join("; ")
                }
            }
            Err(_) => format!("sendgrid error (status {})", status.as_u16()),
        };
        warn!(to, error = %error, "sendgrid rejected mail");
        ChannelResult::failed(channel, error)
    }

    async fn send_resend(&self, to: &str, subject: &str, html: &str) -> ChannelResult {
        let channel = ChannelType::Email;
        let payload = ResendMail {
            from: format!("{} <{}>", self.config.from_name, self.config.from_email),
            to: vec![to],
            subject,
            html,
        };

        let response = match self
            .http
            .post(self.api_url("/emails"))
            .bearer_auth(self.config.api_key.expose_secret())
            .timeout(self.timeout())
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return ChannelResult::failed(channel, format!("transport error: {err}")),
        };

        let status = response.status();
        if status.is_success() {
            let message_id = match response.json::<ResendSent>().await {
                Ok(sent) => Some(sent.id),
                Err(_) => None,
            };
            debug!(to, message_id = message_id.as_deref().unwrap_or(""), "resend accepted mail");
            return ChannelResult::delivered(channel, message_id);
        }

        let error = match response.json::<ResendErrorBody>().await {
            Ok(ResendErrorBody {
                message: Some(message),
            }) => message,
            _ => format!("resend error (status {})", status.as_u16()),
        };
        warn!(to, error = %error, "resend rejected mail");
        ChannelResult::failed(channel, error)
    }
}

/// Subject line drivers see in their inbox.
fn subject_for(route: &Route) -> String {
    format!("Route Assignment: {} - {}", route.name, route.date)
}

fn trimmed_email(driver: &Driver) -> Option<&str> {
    driver
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty())
}

#[async_trait]
impl ChannelAdapter for EmailAdapter {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Email
    }

    fn can_send(&self, driver: &Driver) -> bool {
        trimmed_email(driver).is_some()
    }

    async fn send(&self, ctx: DispatchContext<'_>) -> ChannelResult {
        let channel = ChannelType::Email;
        if !self.config.is_configured() {
            return ChannelResult::failed(
                channel,
                format!("{} API key not configured", self.config.provider),
            );
        }
        let Some(to) = trimmed_email(ctx.driver) else {
            return ChannelResult::failed(channel, "driver has no email address");
        };

        let subject = subject_for(ctx.route);
        match self.config.provider {
            EmailProvider::Sendgrid => self.send_sendgrid(to, &subject, ctx.message).await,
            EmailProvider::Resend => self.send_resend(to, &subject, ctx.message).await,
        }
    }

    async fn health_check(&self) -> HealthStatus {
        if !self.config.is_configured() {
            return HealthStatus::down(format!(
                "{} API key not configured",
                self.config.provider
            ));
        }

        let path = match self.config.provider {
            EmailProvider::Sendgrid => "/v3/user/profile",
            EmailProvider::Resend => "/domains",
        };
        match self
            .http
            .get(self.api_url(path))
            .bearer_auth(self.config.api_key.expose_secret())
            .timeout(self.timeout())
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                HealthStatus::up(format!("{} reachable", self.config.provider))
            }
            Ok(response) if response.status() == reqwest::StatusCode::UNAUTHORIZED => {
                HealthStatus::down("invalid API key")
            }
            Ok(response) => HealthStatus::down(format!(
                "{} returned status {}",
                self.config.provider,
                response.status().as_u16()
            )),
            Err(err) => HealthStatus::down(format!("transport error: {err}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {
        dray_common::{Dispatch, DispatchRequest},
        mockito::Matcher,
        secrecy::Secret,
        serde_json::json,
    };

    use super::*;

    fn config(provider: EmailProvider, api_base: &str) -> EmailChannelConfig {
        EmailChannelConfig {
            provider,
            api_key: Secret::new("key-123".into()),
            from_email: "dispatch@fleet.example".into(),
            from_name: "Fleet Dispatch".into(),
            api_base: Some(api_base.into()),
            timeout_secs: 2,
        }
    }

    fn driver(email: Option<&str>) -> Driver {
        Driver {
            id: "d1".into(),
            first_name: "Maria".into(),
            last_name: "Silva".into(),
            email: email.map(Into::into),
            chat_id: None,
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
        Dispatch::new(DispatchRequest {
            route_id: "r1".into(),
            driver_id: "d1".into(),
            channels: None,
            multi_channel: None,
            metadata: None,
        })
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
    async fn sendgrid_send_builds_v3_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v3/mail/send")
            .match_header("authorization", "Bearer key-123")
            .match_body(Matcher::PartialJson(json!({
                "personalizations": [{"to": [{"email": "maria@example.com"}]}],
                "from": {"email": "dispatch@fleet.example", "name": "Fleet Dispatch"},
                "subject": "Route Assignment: North Loop - 2026-03-15",
                "content": [{"type": "text/html", "value": "<p>hi</p>"}],
            })))
            .with_status(202)
            .with_header("x-message-id", "sg-789")
            .create_async()
            .await;

        let adapter = EmailAdapter::new(config(EmailProvider::Sendgrid, &server.url()));
        let dispatch = dispatch();
        let driver = driver(Some("maria@example.com"));
        let route = route();
        let result = adapter
            .send(ctx(&dispatch, &driver, &route, "<p>hi</p>"))
            .await;

        assert!(result.success);
        assert_eq!(result.provider_message_id.as_deref(), Some("sg-789"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn sendgrid_error_messages_are_joined() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v3/mail/send")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"errors":[{"message":"from address not verified"},{"message":"subject required"}]}"#,
            )
            .create_async()
            .await;

        let adapter = EmailAdapter::new(config(EmailProvider::Sendgrid, &server.url()));
        let dispatch = dispatch();
        let driver = driver(Some("maria@example.com"));
        let route = route();
        let result = adapter.send(ctx(&dispatch, &driver, &route, "x")).await;

        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("from address not verified; subject required")
        );
    }

    #[tokio::test]
    async fn sendgrid_opaque_failure_reports_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v3/mail/send")
            .with_status(503)
            .with_body("upstream unavailable")
            .create_async()
            .await;

        let adapter = EmailAdapter::new(config(EmailProvider::Sendgrid, &server.url()));
        let dispatch = dispatch();
        let driver = driver(Some("maria@example.com"));
        let route = route();
        let result = adapter.send(ctx(&dispatch, &driver, &route, "x")).await;

        assert_eq!(result.error.as_deref(), Some("sendgrid error (status 503)"));
    }

    #[tokio::test]
    async fn resend_send_returns_body_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/emails")
            .match_header("authorization", "Bearer key-123")
            .match_body(Matcher::PartialJson(json!({
                "from": "Fleet Dispatch <dispatch@fleet.example>",
                "to": ["maria@example.com"],
                "subject": "Route Assignment: North Loop - 2026-03-15",
                "html": "<p>hi</p>",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"re-456"}"#)
            .create_async()
            .await;

        let adapter = EmailAdapter::new(config(EmailProvider::Resend, &server.url()));
        let dispatch = dispatch();
        let driver = driver(Some("maria@example.com"));
        let route = route();
        let result = adapter
            .send(ctx(&dispatch, &driver, &route, "<p>hi</p>"))
            .await;

        assert!(result.success);
        assert_eq!(result.provider_message_id.as_deref(), Some("re-456"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn resend_error_surfaces_message() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/emails")
            .with_status(422)
            .with_header("content-type", "application/json")
            .with_body(r#"{"statusCode":422,"name":"validation_error","message":"invalid to address"}"#)
            .create_async()
            .await;

        let adapter = EmailAdapter::new(config(EmailProvider::Resend, &server.url()));
        let dispatch = dispatch();
        let driver = driver(Some("maria@example.com"));
        let route = route();
        let result = adapter.send(ctx(&dispatch, &driver, &route, "x")).await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("invalid to address"));
    }

    #[tokio::test]
    async fn unconfigured_key_fails_before_any_request() {
        let adapter = EmailAdapter::new(EmailChannelConfig::default());
        let dispatch = dispatch();
        let driver = driver(Some("maria@example.com"));
        let route = route();
        let result = adapter.send(ctx(&dispatch, &driver, &route, "x")).await;

        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("sendgrid API key not configured")
        );
    }

    #[tokio::test]
    async fn missing_email_fails_before_any_request() {
        let adapter = EmailAdapter::new(config(EmailProvider::Sendgrid, "http://127.0.0.1:9"));
        assert!(!adapter.can_send(&driver(None)));
        assert!(!adapter.can_send(&driver(Some("   "))));

        let dispatch = dispatch();
        let driver = driver(None);
        let route = route();
        let result = adapter.send(ctx(&dispatch, &driver, &route, "x")).await;
        assert_eq!(result.error.as_deref(), Some("driver has no email address"));
    }

    #[tokio::test]
    async fn health_hits_provider_profile_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v3/user/profile")
            .match_header("authorization", "Bearer key-123")
            .with_status(200)
            .with_body(r#"{"username":"fleet"}"#)
            .create_async()
            .await;

        let adapter = EmailAdapter::new(config(EmailProvider::Sendgrid, &server.url()));
        let status = adapter.health_check().await;

        assert!(status.healthy);
        assert_eq!(status.message.as_deref(), Some("sendgrid reachable"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn health_distinguishes_bad_credentials() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/domains")
            .with_status(401)
            .create_async()
            .await;

        let adapter = EmailAdapter::new(config(EmailProvider::Resend, &server.url()));
        let status = adapter.health_check().await;

        assert!(!status.healthy);
        assert_eq!(status.message.as_deref(), Some("invalid API key"));
    }

    #[tokio::test]
    async fn health_when_unconfigured_says_so_without_io() {
        let adapter = EmailAdapter::new(EmailChannelConfig::default());
        let status = adapter.health_check().await;

        assert!(!status.healthy);
        assert!(status.message.unwrap().contains("not configured"));
    }
}
