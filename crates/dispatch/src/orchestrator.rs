use std::sync::Arc;

use {
    futures::future::join_all,
    serde::Serialize,
    serde_json::Value,
    tracing::{debug, info, warn},
};

use {
    dray_channels::{AdapterRegistry, ChannelResult, ChannelRouter, DispatchContext},
    dray_common::{
        ChannelType, Dispatch, DispatchRequest, DispatchStatus, Driver, Route, Stop, Vehicle,
    },
    dray_templates::{TemplateEngine, build_context},
};

// ── Job and outcome ─────────────────────────────────────────────────────────

/// Everything one dispatch needs, fetched by the caller up front. The
/// orchestrator does no entity lookups of its own.
#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub request: DispatchRequest,
    pub route: Route,
    pub driver: Driver,
    pub vehicle: Option<Vehicle>,
    pub stops: Vec<Stop>,
}

/// Terminal record of one dispatch: the identity, the derived status, and
/// every delivery attempt in the order it was made.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub dispatch: Dispatch,
    pub status: DispatchStatus,
    pub attempts: Vec<ChannelResult>,
}

/// Counts over one `dispatch_many` batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub delivered: usize,
    pub partial: usize,
    pub failed: usize,
}

// ── Orchestrator ────────────────────────────────────────────────────────────

/// Drives one dispatch end to end: channel resolution, per-channel
/// rendering, delivery, and fallback.
pub struct DispatchOrchestrator {
    registry: Arc<AdapterRegistry>,
    router: ChannelRouter,
    engine: TemplateEngine,
    base_url: String,
}

impl DispatchOrchestrator {
    #[must_use]
    pub fn new(
        registry: Arc<AdapterRegistry>,
        engine: TemplateEngine,
        base_url: impl Into<String>,
    ) -> Self {
        let router = ChannelRouter::new(Arc::clone(&registry));
        Self {
            registry,
            router,
            engine,
            base_url: base_url.into(),
        }
    }

    /// Run one dispatch.
    ///
    /// Multiple resolved channels fan out concurrently with no fallback;
    /// a single resolved channel walks the fallback chain sequentially
    /// until an attempt succeeds or no untried fallback remains. An empty
    /// resolution is a `Failed` outcome with zero attempts.
    pub async fn dispatch(&self, job: &DispatchJob) -> DispatchOutcome {
        let dispatch = Dispatch::new(job.request.clone());
        let resolved = self.router.resolve_channels(&job.request, &job.driver);
        if resolved.is_empty() {
            warn!(
                dispatch_id = %dispatch.id,
                driver_id = %job.driver.id,
                "no eligible channel for driver"
            );
            return DispatchOutcome {
                dispatch,
                status: DispatchStatus::Failed,
                attempts: Vec::new(),
            };
        }

        let context = build_context(
            &job.route,
            &job.driver,
            job.vehicle.as_ref(),
            &job.stops,
            &self.base_url,
            dispatch.created_at,
        );

        let attempts = if let [single] = resolved.as_slice() {
            self.with_fallback(&dispatch, job, &context, *single).await
        } else {
            self.fan_out(&dispatch, job, &context, &resolved).await
        };

        let status = DispatchStatus::from_outcomes(attempts.iter().map(|attempt| attempt.success));
        info!(
            dispatch_id = %dispatch.id,
            driver_id = %job.driver.id,
            status = %status,
            attempts = attempts.len(),
            "dispatch complete"
        );
        DispatchOutcome {
            dispatch,
            status,
            attempts,
        }
    }

    /// Dispatch a batch concurrently. Jobs are isolated; one failing driver
    /// never affects another's delivery.
    pub async fn dispatch_many(&self, jobs: &[DispatchJob]) -> (Vec<DispatchOutcome>, BatchSummary) {
        let outcomes = join_all(jobs.iter().map(|job| self.dispatch(job))).await;
        let mut summary = BatchSummary {
            total: outcomes.len(),
            ..BatchSummary::default()
        };
        for outcome in &outcomes {
            match outcome.status {
                DispatchStatus::Delivered => summary.delivered += 1,
                DispatchStatus::Partial => summary.partial += 1,
                DispatchStatus::Failed => summary.failed += 1,
            }
        }
        info!(
            total = summary.total,
            delivered = summary.delivered,
            partial = summary.partial,
            failed = summary.failed,
            "batch dispatch complete"
        );
        (outcomes, summary)
    }

    /// Render for `channel` and invoke its adapter once. A render failure
    /// becomes a failed attempt without touching the adapter.
    async fn attempt(
        &self,
        dispatch: &Dispatch,
        job: &DispatchJob,
        context: &Value,
        channel: ChannelType,
    ) -> ChannelResult {
        let message = match self.engine.render_for_channel(channel, context) {
            Ok(message) => message,
            Err(err) => {
                warn!(
                    dispatch_id = %dispatch.id,
                    channel = %channel,
                    error = %err,
                    "render failed, skipping adapter"
                );
                return ChannelResult::failed(channel, err.to_string());
            }
        };
        let Some(adapter) = self.registry.get(channel) else {
            return ChannelResult::failed(
                channel,
                format!("no adapter registered for channel: {channel}"),
            );
        };
        adapter
            .send(DispatchContext {
                dispatch,
                driver: &job.driver,
                route: &job.route,
                vehicle: job.vehicle.as_ref(),
                stops: &job.stops,
                message: &message,
            })
            .await
    }

    async fn fan_out(
        &self,
        dispatch: &Dispatch,
        job: &DispatchJob,
        context: &Value,
        channels: &[ChannelType],
    ) -> Vec<ChannelResult> {
        debug!(dispatch_id = %dispatch.id, channels = ?channels, "multi-channel fan-out");
        join_all(
            channels
                .iter()
                .map(|channel| self.attempt(dispatch, job, context, *channel)),
        )
        .await
    }

    async fn with_fallback(
        &self,
        dispatch: &Dispatch,
        job: &DispatchJob,
        context: &Value,
        first: ChannelType,
    ) -> Vec<ChannelResult> {
        let mut attempts: Vec<ChannelResult> = Vec::new();
        let mut attempted: Vec<ChannelType> = Vec::new();
        let mut current = first;
        loop {
            let result = self.attempt(dispatch, job, context, current).await;
            let succeeded = result.success;
            attempted.push(current);
            attempts.push(result);
            if succeeded {
                break;
            }
            // One attempt per channel per dispatch; the chain is bounded by
            // the driver's available channel count.
            let next = self
                .router
                .fallback_channel(&job.driver, current)
                .filter(|candidate| !attempted.contains(candidate));
            match next {
                Some(next_channel) => {
                    info!(
                        dispatch_id = %dispatch.id,
                        failed = %current,
                        fallback = %next_channel,
                        "falling back to alternate channel"
                    );
                    current = next_channel;
                }
                None => break,
            }
        }
        attempts
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use {async_trait::async_trait, tempfile::TempDir};

    use {
        super::*,
        dray_channels::{ChannelAdapter, HealthStatus},
    };

    // ── Scripted adapter ────────────────────────────────────────────────────

    #[derive(Default)]
    struct AdapterLog {
        calls: AtomicUsize,
        messages: Mutex<Vec<String>>,
    }

    struct ScriptedAdapter {
        channel: ChannelType,
        succeed: bool,
        log: Arc<AdapterLog>,
    }

    #[async_trait]
    impl ChannelAdapter for ScriptedAdapter {
        fn channel_type(&self) -> ChannelType {
            self.channel
        }

        fn can_send(&self, _driver: &Driver) -> bool {
            true
        }

        async fn send(&self, ctx: DispatchContext<'_>) -> ChannelResult {
            self.log.calls.fetch_add(1, Ordering::SeqCst);
            self.log
                .messages
                .lock()
                .unwrap()
                .push(ctx.message.to_string());
            if self.succeed {
                ChannelResult::delivered(self.channel, Some(format!("{}-msg", self.channel)))
            } else {
                ChannelResult::failed(self.channel, "provider rejected")
            }
        }

        async fn health_check(&self) -> HealthStatus {
            HealthStatus::up("scripted")
        }
    }

    struct Rig {
        orchestrator: DispatchOrchestrator,
        telegram: Arc<AdapterLog>,
        email: Arc<AdapterLog>,
        _dir: TempDir,
    }

    /// Orchestrator over two scripted adapters and real template files.
    fn rig(telegram_succeeds: bool, email_succeeds: bool) -> Rig {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("telegram.md"), "TG {{route.name}}").unwrap();
        std::fs::write(dir.path().join("email.html"), "EM {{route.name}}").unwrap();

        let telegram = Arc::new(AdapterLog::default());
        let email = Arc::new(AdapterLog::default());
        let mut registry = AdapterRegistry::new();
        registry.register(Box::new(ScriptedAdapter {
            channel: ChannelType::Telegram,
            succeed: telegram_succeeds,
            log: Arc::clone(&telegram),
        }));
        registry.register(Box::new(ScriptedAdapter {
            channel: ChannelType::Email,
            succeed: email_succeeds,
            log: Arc::clone(&email),
        }));

        let orchestrator = DispatchOrchestrator::new(
            Arc::new(registry),
            TemplateEngine::new(dir.path()),
            "http://localhost:3000",
        );
        Rig {
            orchestrator,
            telegram,
            email,
            _dir: dir,
        }
    }

    fn job(channels: Option<Vec<ChannelType>>, multi: Option<bool>) -> DispatchJob {
        DispatchJob {
            request: DispatchRequest {
                route_id: "r1".into(),
                driver_id: "d1".into(),
                channels,
                multi_channel: multi,
                metadata: None,
            },
            route: Route {
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
                driver_id: Some("d1".into()),
            },
            driver: Driver {
                id: "d1".into(),
                first_name: "Maria".into(),
                last_name: "Silva".into(),
                email: Some("maria@example.com".into()),
                chat_id: Some("12345".into()),
                preferred_channel: None,
                fallback_enabled: true,
            },
            vehicle: None,
            stops: Vec::new(),
        }
    }

    // ── Single-channel path ─────────────────────────────────────────────────

    #[tokio::test]
    async fn plain_request_delivers_on_default_channel() {
        let rig = rig(true, true);
        let outcome = rig.orchestrator.dispatch(&job(None, None)).await;

        assert_eq!(outcome.status, DispatchStatus::Delivered);
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(outcome.attempts[0].channel, ChannelType::Telegram);
        assert_eq!(outcome.attempts[0].provider_message_id.as_deref(), Some("telegram-msg"));
        assert_eq!(rig.telegram.calls.load(Ordering::SeqCst), 1);
        assert_eq!(rig.email.calls.load(Ordering::SeqCst), 0);
        // Message was rendered with the telegram template.
        assert_eq!(
            rig.telegram.messages.lock().unwrap().as_slice(),
            ["TG North Loop"]
        );
    }

    #[tokio::test]
    async fn failed_primary_falls_back_and_ends_partial() {
        let rig = rig(false, true);
        let outcome = rig.orchestrator.dispatch(&job(None, None)).await;

        assert_eq!(outcome.status, DispatchStatus::Partial);
        assert_eq!(outcome.attempts.len(), 2);
        assert_eq!(outcome.attempts[0].channel, ChannelType::Telegram);
        assert!(!outcome.attempts[0].success);
        assert_eq!(outcome.attempts[1].channel, ChannelType::Email);
        assert!(outcome.attempts[1].success);
        // The fallback rendered with its own template.
        assert_eq!(
            rig.email.messages.lock().unwrap().as_slice(),
            ["EM North Loop"]
        );
    }

    #[tokio::test]
    async fn fallback_chain_attempts_each_channel_once() {
        let rig = rig(false, false);
        let outcome = rig.orchestrator.dispatch(&job(None, None)).await;

        assert_eq!(outcome.status, DispatchStatus::Failed);
        assert_eq!(outcome.attempts.len(), 2);
        assert_eq!(rig.telegram.calls.load(Ordering::SeqCst), 1);
        assert_eq!(rig.email.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fallback_disabled_stops_after_first_failure() {
        let rig = rig(false, true);
        let mut job = job(None, None);
        job.driver.fallback_enabled = false;
        let outcome = rig.orchestrator.dispatch(&job).await;

        assert_eq!(outcome.status, DispatchStatus::Failed);
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(rig.email.calls.load(Ordering::SeqCst), 0);
    }

    // ── Fan-out path ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn multi_channel_attempts_every_channel() {
        let rig = rig(true, true);
        let outcome = rig.orchestrator.dispatch(&job(None, Some(true))).await;

        assert_eq!(outcome.status, DispatchStatus::Delivered);
        assert_eq!(outcome.attempts.len(), 2);
        assert_eq!(outcome.attempts[0].channel, ChannelType::Telegram);
        assert_eq!(outcome.attempts[1].channel, ChannelType::Email);
    }

    #[tokio::test]
    async fn fan_out_failure_gets_no_fallback() {
        let rig = rig(false, true);
        let outcome = rig.orchestrator.dispatch(&job(None, Some(true))).await;

        assert_eq!(outcome.status, DispatchStatus::Partial);
        assert_eq!(outcome.attempts.len(), 2);
        // The failed telegram attempt must not trigger a second email send.
        assert_eq!(rig.telegram.calls.load(Ordering::SeqCst), 1);
        assert_eq!(rig.email.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn override_fan_out_keeps_request_order() {
        let rig = rig(true, true);
        let outcome = rig
            .orchestrator
            .dispatch(&job(
                Some(vec![ChannelType::Email, ChannelType::Telegram]),
                None,
            ))
            .await;

        assert_eq!(outcome.attempts.len(), 2);
        assert_eq!(outcome.attempts[0].channel, ChannelType::Email);
        assert_eq!(outcome.attempts[1].channel, ChannelType::Telegram);
    }

    // ── Degenerate cases ────────────────────────────────────────────────────

    #[tokio::test]
    async fn no_eligible_channel_is_failed_with_zero_attempts() {
        let dir = TempDir::new().unwrap();
        let orchestrator = DispatchOrchestrator::new(
            Arc::new(AdapterRegistry::new()),
            TemplateEngine::new(dir.path()),
            "http://localhost:3000",
        );
        let mut job = job(None, None);
        job.driver.chat_id = None;
        job.driver.email = None;

        let outcome = orchestrator.dispatch(&job).await;
        assert_eq!(outcome.status, DispatchStatus::Failed);
        assert!(outcome.attempts.is_empty());
    }

    #[tokio::test]
    async fn render_failure_skips_adapter_and_falls_back() {
        let rig = rig(true, true);
        // Remove the telegram template so rendering fails for that channel.
        std::fs::remove_file(rig._dir.path().join("telegram.md")).unwrap();

        let outcome = rig.orchestrator.dispatch(&job(None, None)).await;

        assert_eq!(outcome.status, DispatchStatus::Partial);
        assert_eq!(outcome.attempts.len(), 2);
        assert!(!outcome.attempts[0].success);
        assert!(
            outcome.attempts[0]
                .error
                .as_deref()
                .unwrap()
                .contains("template not found")
        );
        // The telegram adapter was never invoked.
        assert_eq!(rig.telegram.calls.load(Ordering::SeqCst), 0);
        assert_eq!(rig.email.calls.load(Ordering::SeqCst), 1);
    }

    // ── Batch ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn batch_counts_statuses_and_keeps_order() {
        let rig = rig(true, true);
        let good = job(None, None);
        let mut bad = job(None, None);
        bad.driver.id = "d2".into();
        bad.driver.chat_id = None;
        bad.driver.email = None;

        let (outcomes, summary) = rig.orchestrator.dispatch_many(&[good, bad]).await;

        assert_eq!(summary, BatchSummary {
            total: 2,
            delivered: 1,
            partial: 0,
            failed: 1,
        });
        assert_eq!(outcomes[0].status, DispatchStatus::Delivered);
        assert_eq!(outcomes[1].status, DispatchStatus::Failed);
    }
}
