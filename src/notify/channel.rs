use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;

use crate::domain::{AnalysisResult, ContentRecord, RiskLevel, SurfaceId};

use super::surface::{BannerPayload, SurfaceMessage, SurfaceMessenger};

const MESSAGE_MAX_CHARS: usize = 500;
const FALLBACK_REASON: &str = "Potential phishing indicators detected.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),
    #[error("no surface to deliver the banner to")]
    NoSurface,
    #[error("banner delivery failed: {0}")]
    Surface(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub level: RiskLevel,
    pub score: u8,
    pub reason: String,
    pub source: String,
}

impl Alert {
    pub fn from_result(record: &ContentRecord, result: &AnalysisResult) -> Self {
        Self {
            level: result.risk_level,
            score: result.risk_score,
            reason: result.primary_reason().unwrap_or(FALLBACK_REASON).to_string(),
            source: record.display_source().to_string(),
        }
    }

    pub fn title(&self) -> String {
        format!("{} phishing risk detected", self.level.label())
    }

    pub fn message(&self) -> String {
        format!("{}\nScore: {}\n{}", self.source, self.score, self.reason)
            .chars()
            .take(MESSAGE_MAX_CHARS)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationRequest {
    pub title: String,
    pub message: String,
    pub priority: u8,
    pub require_interaction: bool,
}

impl NotificationRequest {
    pub fn for_alert(alert: &Alert) -> Self {
        let high = alert.level == RiskLevel::High;
        Self {
            title: alert.title(),
            message: alert.message(),
            priority: if high { 2 } else { 1 },
            require_interaction: high,
        }
    }
}

pub trait NotificationBackend: Send + Sync {
    fn create<'a>(
        &'a self,
        request: &'a NotificationRequest,
    ) -> BoxFuture<'a, Result<String, NotificationError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    System,
    Banner,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub channel: ChannelKind,
    pub handle: Option<String>,
    pub degraded_from: Option<String>,
}

pub trait AlertChannel: Send + Sync {
    fn deliver<'a>(
        &'a self,
        surface: Option<SurfaceId>,
        alert: &'a Alert,
    ) -> BoxFuture<'a, Result<Delivery, NotificationError>>;
}

pub struct SystemChannel {
    backend: Arc<dyn NotificationBackend>,
}

impl SystemChannel {
    pub fn new(backend: Arc<dyn NotificationBackend>) -> Self {
        Self { backend }
    }
}

impl AlertChannel for SystemChannel {
    fn deliver<'a>(
        &'a self,
        _surface: Option<SurfaceId>,
        alert: &'a Alert,
    ) -> BoxFuture<'a, Result<Delivery, NotificationError>> {
        Box::pin(async move {
            let request = NotificationRequest::for_alert(alert);
            let id = self.backend.create(&request).await?;
            Ok(Delivery {
                channel: ChannelKind::System,
                handle: Some(id),
                degraded_from: None,
            })
        })
    }
}

pub struct BannerChannel {
    messenger: Arc<dyn SurfaceMessenger>,
}

impl BannerChannel {
    pub fn new(messenger: Arc<dyn SurfaceMessenger>) -> Self {
        Self { messenger }
    }
}

impl AlertChannel for BannerChannel {
    fn deliver<'a>(
        &'a self,
        surface: Option<SurfaceId>,
        alert: &'a Alert,
    ) -> BoxFuture<'a, Result<Delivery, NotificationError>> {
        Box::pin(async move {
            let surface = surface.ok_or(NotificationError::NoSurface)?;
            let message = SurfaceMessage::ShowRiskBanner {
                surface,
                payload: BannerPayload {
                    level: alert.level.as_str().to_string(),
                    score: alert.score,
                    reason: alert.reason.clone(),
                    source: alert.source.clone(),
                },
            };
            self.messenger
                .send(message)
                .await
                .map_err(|err| NotificationError::Surface(format!("{err:#}")))?;
            Ok(Delivery {
                channel: ChannelKind::Banner,
                handle: None,
                degraded_from: None,
            })
        })
    }
}

pub struct PrimaryWithFallback {
    primary: Box<dyn AlertChannel>,
    fallback: Box<dyn AlertChannel>,
}

impl PrimaryWithFallback {
    pub fn new(primary: Box<dyn AlertChannel>, fallback: Box<dyn AlertChannel>) -> Self {
        Self { primary, fallback }
    }
}

impl AlertChannel for PrimaryWithFallback {
    fn deliver<'a>(
        &'a self,
        surface: Option<SurfaceId>,
        alert: &'a Alert,
    ) -> BoxFuture<'a, Result<Delivery, NotificationError>> {
        Box::pin(async move {
            let primary_error = match self.primary.deliver(surface, alert).await {
                Ok(delivery) => return Ok(delivery),
                Err(err) => err,
            };
            tracing::warn!(
                target: "notify",
                surface = surface.map(|s| s.0),
                error = %primary_error,
                "primary alert channel failed; using fallback"
            );
            let mut delivery = self.fallback.deliver(surface, alert).await?;
            delivery.degraded_from = Some(primary_error.to_string());
            Ok(delivery)
        })
    }
}
