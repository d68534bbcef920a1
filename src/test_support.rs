use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Result;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use reqwest::Client;
use serde_json::Value;

use crate::{
    analysis::AnalysisClient,
    config::{settings::write_api_base, AnalysisConfig, MonitorConfig},
    db::KeyValueStore,
    domain::{AnalysisResult, ContentRecord, RiskLevel, Source},
    notify::{
        channel::{NotificationBackend, NotificationError, NotificationRequest},
        BannerChannel, NotificationDispatcher, PrimaryWithFallback, SurfaceMessage,
        SurfaceMessenger, SystemChannel,
    },
    tasks::Monitor,
};

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn insert(&self, key: &str, value: Value) {
        self.values.lock().insert(key.to_string(), value);
    }

    pub fn snapshot(&self, key: &str) -> Option<Value> {
        self.values.lock().get(key).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
        Box::pin(async move { Ok(self.snapshot(key)) })
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.insert(key, value);
            Ok(())
        })
    }
}

#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<SurfaceMessage>>,
}

impl RecordingMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<SurfaceMessage> {
        self.sent.lock().clone()
    }
}

impl SurfaceMessenger for RecordingMessenger {
    fn send(&self, message: SurfaceMessage) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.sent.lock().push(message);
            Ok(())
        })
    }
}

pub struct FakeBackend {
    enabled: bool,
    requests: Mutex<Vec<NotificationRequest>>,
}

impl FakeBackend {
    pub fn working() -> Arc<Self> {
        Arc::new(Self {
            enabled: true,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn disabled() -> Arc<Self> {
        Arc::new(Self {
            enabled: false,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<NotificationRequest> {
        self.requests.lock().clone()
    }
}

impl NotificationBackend for FakeBackend {
    fn create<'a>(
        &'a self,
        request: &'a NotificationRequest,
    ) -> BoxFuture<'a, Result<String, NotificationError>> {
        Box::pin(async move {
            if !self.enabled {
                return Err(NotificationError::Unavailable(
                    "notifications are disabled".into(),
                ));
            }
            let mut requests = self.requests.lock();
            requests.push(request.clone());
            Ok(format!("fake_{}", requests.len()))
        })
    }
}

pub fn email_record(sender: &str) -> ContentRecord {
    ContentRecord {
        sender_email: sender.to_string(),
        sender_name: "Billing Team".into(),
        subject: "Your invoice is overdue".into(),
        body_text: "Please settle the attached invoice today.".into(),
        urls: vec!["https://pay.example/invoice".into()],
        attachments: vec![],
        source: Source::Email,
    }
}

pub fn webpage_record(subject: &str, url: &str) -> ContentRecord {
    ContentRecord {
        sender_email: "no-reply@shop.example".into(),
        sender_name: "shop.example".into(),
        subject: subject.to_string(),
        body_text: "Your account has been limited. Confirm your payment details within 24 hours \
                    to avoid permanent suspension of your account."
            .into(),
        urls: vec![url.to_string()],
        attachments: vec![],
        source: Source::Webpage,
    }
}

pub fn long_webpage_record(subject: &str) -> ContentRecord {
    webpage_record(subject, "https://shop.example/login")
}

pub fn alert_result(level: RiskLevel) -> AnalysisResult {
    let score = match level {
        RiskLevel::High => 90,
        RiskLevel::Medium => 55,
        RiskLevel::Low => 5,
    };
    AnalysisResult {
        risk_score: score,
        risk_level: level,
        reasons: vec!["Login form posts to an unrelated domain".into()],
        indicators: None,
        recommended_action: None,
    }
}

pub fn analysis_config() -> AnalysisConfig {
    AnalysisConfig {
        request_timeout: Duration::from_secs(2),
        loopback_hosts: [
            "http://127.0.0.1:5000".to_string(),
            "http://localhost:5000".to_string(),
        ],
    }
}

/// A monitor wired to in-memory fakes, with the analysis base pointed at
/// `api_base`.
pub struct Harness {
    pub monitor: Monitor,
    pub store: Arc<MemoryStore>,
    pub backend: Arc<FakeBackend>,
    pub messenger: Arc<RecordingMessenger>,
}

impl Harness {
    pub async fn new(api_base: &str) -> Self {
        let store = Arc::new(MemoryStore::default());
        write_api_base(store.as_ref(), api_base)
            .await
            .expect("memory store write");

        let backend = FakeBackend::working();
        let messenger = RecordingMessenger::new();
        let dispatcher = NotificationDispatcher::new(Arc::new(PrimaryWithFallback::new(
            Box::new(SystemChannel::new(backend.clone())),
            Box::new(BannerChannel::new(messenger.clone())),
        )));
        let monitor = Monitor::new(
            store.clone(),
            AnalysisClient::new(Client::new(), analysis_config()),
            dispatcher,
            messenger.clone(),
            MonitorConfig {
                debounce: Duration::from_millis(700),
                min_webpage_body_chars: 80,
            },
        );

        Self {
            monitor,
            store,
            backend,
            messenger,
        }
    }
}
