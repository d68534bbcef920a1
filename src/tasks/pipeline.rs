use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use thiserror::Error;

use crate::{
    analysis::{gate, AnalysisClient, AnalysisError},
    config::{MonitorConfig, Settings},
    db::{
        kv::{self, keys},
        KeyValueStore, LatestAnalysis, ResultStore,
    },
    domain::{
        fingerprint, AnalysisResult, ContentRecord, ExtractionError, Fingerprint, RiskLevel,
        Source, SurfaceId,
    },
    notify::{badge_for, Alert, DeliveryOutcome, NotificationDispatcher, SurfaceMessage, SurfaceMessenger},
};

use super::{debounce::EvaluateFn, state::PipelineState};

#[derive(Debug, Clone)]
pub struct PendingChange {
    pub record: ContentRecord,
    pub change_token: Option<String>,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error("settings store unavailable: {0:#}")]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Extraction(ExtractionError),
    Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutoAnalysis {
    pub result: AnalysisResult,
    pub delivery: Option<DeliveryOutcome>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationOutcome {
    Skipped(SkipReason),
    Completed(AutoAnalysis),
}

pub struct Monitor {
    store: Arc<dyn KeyValueStore>,
    results: ResultStore,
    client: AnalysisClient,
    dispatcher: NotificationDispatcher,
    messenger: Arc<dyn SurfaceMessenger>,
    state: PipelineState,
    config: MonitorConfig,
}

impl Monitor {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        client: AnalysisClient,
        dispatcher: NotificationDispatcher,
        messenger: Arc<dyn SurfaceMessenger>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            results: ResultStore::new(store.clone()),
            store,
            client,
            dispatcher,
            messenger,
            state: PipelineState::new(),
            config,
        }
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub fn evaluator(self: &Arc<Self>) -> EvaluateFn<PendingChange> {
        let monitor = Arc::clone(self);
        Arc::new(move |surface, change| {
            let monitor = monitor.clone();
            Box::pin(async move {
                match monitor.evaluate_change(surface, change).await {
                    Ok(EvaluationOutcome::Skipped(reason)) => {
                        tracing::debug!(target: "pipeline", surface = surface.0, ?reason, "evaluation skipped");
                    }
                    Ok(EvaluationOutcome::Completed(analysis)) => {
                        tracing::info!(
                            target: "pipeline",
                            surface = surface.0,
                            risk_score = analysis.result.risk_score,
                            risk_level = %analysis.result.risk_level,
                            delivery = ?analysis.delivery,
                            "background evaluation finished"
                        );
                    }
                    Err(err) => {
                        tracing::warn!(
                            target: "pipeline",
                            surface = surface.0,
                            error = %err,
                            "background evaluation failed"
                        );
                    }
                }
            })
        })
    }

    pub async fn evaluate_change(
        &self,
        surface: SurfaceId,
        change: PendingChange,
    ) -> Result<EvaluationOutcome, PipelineError> {
        let PendingChange { record, change_token } = change;

        if let Err(reason) = record.check_monitorable(self.config.min_webpage_body_chars) {
            return Ok(EvaluationOutcome::Skipped(SkipReason::Extraction(reason)));
        }

        let fp = fingerprint(&record);
        if !self.state.observe_fingerprint(surface, &fp) {
            return Ok(EvaluationOutcome::Skipped(SkipReason::Unchanged));
        }
        self.remember_context(&record, &fp).await;

        let token = change_token
            .filter(|token| !token.is_empty())
            .unwrap_or_else(|| fp.to_string());
        let analysis = self
            .run_auto_analysis(Some(surface), &record, Some(&token))
            .await?;
        Ok(EvaluationOutcome::Completed(analysis))
    }

    pub async fn run_auto_analysis(
        &self,
        surface: Option<SurfaceId>,
        record: &ContentRecord,
        change_token: Option<&str>,
    ) -> Result<AutoAnalysis, PipelineError> {
        let settings = Settings::load(self.store.as_ref()).await?;
        let result = match gate::evaluate(record, &settings) {
            Some(result) => result,
            None => self.client.analyze(record, &settings).await?,
        };

        if let Err(err) = self.results.write(surface, record, &result, Utc::now()).await {
            tracing::warn!(target: "pipeline", error = %err, "failed to persist latest analysis");
        }

        let delivery = match surface {
            Some(surface) => {
                self.show_badge(surface, result.risk_level).await;
                Some(
                    self.dispatcher
                        .maybe_notify(surface, record, &result, change_token, self.state.dedup())
                        .await,
                )
            }
            None => None,
        };

        Ok(AutoAnalysis { result, delivery })
    }

    pub async fn analyze_on_demand(&self, record: &ContentRecord) -> Result<AnalysisResult, PipelineError> {
        let settings = Settings::load(self.store.as_ref()).await?;
        Ok(self.client.analyze(record, &settings).await?)
    }

    pub async fn send_test_notification(&self, surface: Option<SurfaceId>) -> DeliveryOutcome {
        let record = ContentRecord {
            sender_email: String::new(),
            sender_name: "phish-guard.local".to_string(),
            subject: "Notification test".to_string(),
            body_text: String::new(),
            urls: Vec::new(),
            attachments: Vec::new(),
            source: Source::Webpage,
        };
        let result = AnalysisResult {
            risk_score: 68,
            risk_level: RiskLevel::Medium,
            reasons: vec!["Test notification from Phish Guard extension.".to_string()],
            indicators: None,
            recommended_action: None,
        };
        self.dispatcher
            .deliver(surface, &Alert::from_result(&record, &result))
            .await
    }

    pub async fn latest_analysis(&self) -> Result<Option<LatestAnalysis>> {
        self.results.read_latest().await
    }

    pub fn forget_surface(&self, surface: SurfaceId) {
        self.state.forget(surface);
    }

    async fn show_badge(&self, surface: SurfaceId, level: RiskLevel) {
        let badge = badge_for(level);
        let message = SurfaceMessage::SetBadge {
            surface,
            text: badge.text.to_string(),
            color: badge.color.to_string(),
        };
        if let Err(err) = self.messenger.send(message).await {
            tracing::warn!(target: "pipeline", surface = surface.0, error = %err, "failed to update badge");
        }
    }

    async fn remember_context(&self, record: &ContentRecord, fp: &Fingerprint) {
        let stored = async {
            kv::set_json(self.store.as_ref(), keys::LATEST_EMAIL_CONTEXT, record).await?;
            kv::set_json(self.store.as_ref(), keys::LATEST_EMAIL_FINGERPRINT, fp).await
        };
        if let Err(err) = stored.await {
            tracing::warn!(target: "pipeline", error = %err, "failed to persist latest content");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::{
        analysis::client::ANALYZE_PATH,
        config::settings::write_domains,
        notify::channel::ChannelKind,
        tasks::debounce::ChangeDebouncer,
        test_support::{email_record, long_webpage_record, Harness},
    };

    fn high_risk_body() -> serde_json::Value {
        json!({
            "risk_score": 88.2,
            "risk_level": "high",
            "reasons": ["Login form posts to an unrelated domain"],
            "recommended_action": "Do not click links or open attachments."
        })
    }

    async fn service(status: u16, body: serde_json::Value, expected_calls: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ANALYZE_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(expected_calls)
            .mount(&server)
            .await;
        server
    }

    fn change(record: ContentRecord) -> PendingChange {
        PendingChange {
            record,
            change_token: None,
        }
    }

    #[tokio::test]
    async fn unchanged_content_never_alerts_twice() {
        let server = service(200, high_risk_body(), 1).await;
        let harness = Harness::new(&server.uri()).await;
        let record = long_webpage_record("Sign in to continue");

        let first = harness
            .monitor
            .evaluate_change(SurfaceId(1), change(record.clone()))
            .await
            .unwrap();
        let EvaluationOutcome::Completed(analysis) = first else {
            panic!("expected a completed evaluation");
        };
        assert_eq!(analysis.result.risk_level, RiskLevel::High);
        assert!(matches!(
            analysis.delivery,
            Some(DeliveryOutcome::Delivered { channel: ChannelKind::System, .. })
        ));

        let second = harness
            .monitor
            .evaluate_change(SurfaceId(1), change(record))
            .await
            .unwrap();
        assert_eq!(second, EvaluationOutcome::Skipped(SkipReason::Unchanged));
        assert_eq!(harness.backend.requests().len(), 1);
    }

    #[tokio::test]
    async fn rerunning_pipeline_with_same_token_is_suppressed() {
        let server = service(200, high_risk_body(), 2).await;
        let harness = Harness::new(&server.uri()).await;
        let record = long_webpage_record("Sign in to continue");
        let token = fingerprint(&record).to_string();

        let first = harness
            .monitor
            .run_auto_analysis(Some(SurfaceId(3)), &record, Some(&token))
            .await
            .unwrap();
        let second = harness
            .monitor
            .run_auto_analysis(Some(SurfaceId(3)), &record, Some(&token))
            .await
            .unwrap();

        assert!(matches!(first.delivery, Some(DeliveryOutcome::Delivered { .. })));
        assert_eq!(second.delivery, Some(DeliveryOutcome::Suppressed));
        assert_eq!(harness.backend.requests().len(), 1);
    }

    #[tokio::test]
    async fn blocklisted_sender_skips_the_network() {
        let server = service(200, high_risk_body(), 0).await;
        let harness = Harness::new(&server.uri()).await;
        write_domains(harness.store.as_ref(), keys::BLOCKLIST_DOMAINS, ["Shop.Example"])
            .await
            .unwrap();

        let record = long_webpage_record("Flash sale");
        let outcome = harness
            .monitor
            .evaluate_change(SurfaceId(2), change(record.clone()))
            .await
            .unwrap();
        let EvaluationOutcome::Completed(analysis) = outcome else {
            panic!("expected a completed evaluation");
        };
        assert_eq!(analysis.result.risk_score, 100);

        let latest = harness.monitor.latest_analysis().await.unwrap().unwrap();
        assert_eq!(latest.payload, record);
        assert_eq!(latest.result.risk_level, RiskLevel::High);

        let badges: Vec<_> = harness
            .messenger
            .sent()
            .into_iter()
            .filter(|m| matches!(m, SurfaceMessage::SetBadge { .. }))
            .collect();
        assert_eq!(
            badges,
            vec![SurfaceMessage::SetBadge {
                surface: SurfaceId(2),
                text: "HIGH".into(),
                color: "#b83232".into(),
            }]
        );
    }

    #[tokio::test]
    async fn settings_edits_apply_to_next_evaluation() {
        let server = service(200, high_risk_body(), 1).await;
        let harness = Harness::new(&server.uri()).await;
        let record = long_webpage_record("Flash sale");

        let first = harness
            .monitor
            .run_auto_analysis(None, &record, None)
            .await
            .unwrap();
        assert_eq!(first.result.risk_level, RiskLevel::High);
        assert!(first.delivery.is_none());

        write_domains(harness.store.as_ref(), keys::ALLOWLIST_DOMAINS, ["shop.example"])
            .await
            .unwrap();
        let second = harness
            .monitor
            .run_auto_analysis(None, &record, None)
            .await
            .unwrap();
        assert_eq!(second.result.risk_level, RiskLevel::Low);
        assert_eq!(second.result.risk_score, 0);
    }

    #[tokio::test]
    async fn analysis_failure_writes_nothing_and_pipeline_recovers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(high_risk_body()))
            .mount(&server)
            .await;
        let harness = Harness::new(&server.uri()).await;
        let record = long_webpage_record("Sign in to continue");

        let err = harness
            .monitor
            .run_auto_analysis(Some(SurfaceId(1)), &record, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Analysis(AnalysisError::Status { status: 500, .. })));
        assert!(harness.monitor.latest_analysis().await.unwrap().is_none());
        assert!(harness.messenger.sent().is_empty());

        let retry = harness
            .monitor
            .run_auto_analysis(Some(SurfaceId(1)), &record, None)
            .await
            .unwrap();
        assert_eq!(retry.result.risk_level, RiskLevel::High);
        assert!(harness.monitor.latest_analysis().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn short_pages_and_email_alerts_are_filtered() {
        let server = service(200, high_risk_body(), 1).await;
        let harness = Harness::new(&server.uri()).await;

        let mut short = long_webpage_record("Tiny");
        short.body_text = "too short".into();
        let skipped = harness
            .monitor
            .evaluate_change(SurfaceId(1), change(short))
            .await
            .unwrap();
        assert!(matches!(
            skipped,
            EvaluationOutcome::Skipped(SkipReason::Extraction(ExtractionError::BodyTooShort { .. }))
        ));

        let outcome = harness
            .monitor
            .evaluate_change(SurfaceId(1), change(email_record("ceo@neutral.example")))
            .await
            .unwrap();
        let EvaluationOutcome::Completed(analysis) = outcome else {
            panic!("expected a completed evaluation");
        };
        assert_eq!(analysis.result.risk_level, RiskLevel::High);
        assert_eq!(analysis.delivery, Some(DeliveryOutcome::Ineligible));
        assert!(harness.backend.requests().is_empty());
    }

    #[tokio::test]
    async fn on_demand_analysis_leaves_store_untouched() {
        let server = service(200, high_risk_body(), 1).await;
        let harness = Harness::new(&server.uri()).await;

        let result = harness
            .monitor
            .analyze_on_demand(&email_record("ceo@neutral.example"))
            .await
            .unwrap();
        assert_eq!(result.risk_score, 88);
        assert!(harness.monitor.latest_analysis().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_notification_uses_sample_alert() {
        let harness = Harness::new("http://127.0.0.1:9").await;
        let outcome = harness.monitor.send_test_notification(Some(SurfaceId(5))).await;
        assert!(matches!(outcome, DeliveryOutcome::Delivered { .. }));

        let requests = harness.backend.requests();
        assert_eq!(requests[0].title, "MEDIUM phishing risk detected");
        assert!(requests[0].message.starts_with("Notification test\nScore: 68"));
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_burst_reaches_pipeline_once() {
        let harness = Harness::new("http://127.0.0.1:9").await;
        write_domains(harness.store.as_ref(), keys::BLOCKLIST_DOMAINS, ["shop.example"])
            .await
            .unwrap();
        let monitor = Arc::new(harness.monitor);
        let debouncer = ChangeDebouncer::new(Duration::from_millis(700), monitor.evaluator());

        for subject in ["Loading", "Almost there", "Account locked"] {
            debouncer.trigger(SurfaceId(8), change(long_webpage_record(subject)));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_secs(2)).await;

        let latest = monitor.latest_analysis().await.unwrap().unwrap();
        assert_eq!(latest.payload.subject, "Account locked");
        let alerts = harness.backend.requests();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].message.starts_with("Account locked"));
    }
}
