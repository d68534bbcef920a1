use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use serde::Serialize;

use crate::domain::{AnalysisResult, ContentRecord, SurfaceId};

use super::channel::{Alert, AlertChannel, ChannelKind, Delivery};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Ineligible,
    Suppressed,
    Delivered {
        channel: ChannelKind,
        handle: Option<String>,
    },
    Degraded {
        channel: ChannelKind,
        primary_error: String,
    },
    Failed {
        error: String,
    },
}

impl From<Delivery> for DeliveryOutcome {
    fn from(delivery: Delivery) -> Self {
        match delivery.degraded_from {
            Some(primary_error) => DeliveryOutcome::Degraded {
                channel: delivery.channel,
                primary_error,
            },
            None => DeliveryOutcome::Delivered {
                channel: delivery.channel,
                handle: delivery.handle,
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct NotificationDedup {
    last_alerted: Mutex<HashMap<SurfaceId, String>>,
}

impl NotificationDedup {
    /// False when `key` is already the surface's last alerted key.
    pub fn claim(&self, surface: SurfaceId, key: &str) -> bool {
        let mut last = self.last_alerted.lock();
        if last.get(&surface).map(String::as_str) == Some(key) {
            return false;
        }
        last.insert(surface, key.to_string());
        true
    }

    pub fn forget(&self, surface: SurfaceId) {
        self.last_alerted.lock().remove(&surface);
    }
}

pub struct NotificationDispatcher {
    channel: Arc<dyn AlertChannel>,
}

impl NotificationDispatcher {
    pub fn new(channel: Arc<dyn AlertChannel>) -> Self {
        Self { channel }
    }

    pub fn is_eligible(record: &ContentRecord, result: &AnalysisResult) -> bool {
        record.source.is_passive() && result.risk_level.warrants_alert()
    }

    pub fn dedup_key(record: &ContentRecord, result: &AnalysisResult, change_token: Option<&str>) -> String {
        let token = change_token
            .filter(|token| !token.is_empty())
            .unwrap_or(record.subject.as_str());
        format!("{token}:{}", result.risk_level)
    }

    pub async fn maybe_notify(
        &self,
        surface: SurfaceId,
        record: &ContentRecord,
        result: &AnalysisResult,
        change_token: Option<&str>,
        dedup: &NotificationDedup,
    ) -> DeliveryOutcome {
        if !Self::is_eligible(record, result) {
            return DeliveryOutcome::Ineligible;
        }

        let key = Self::dedup_key(record, result, change_token);
        if !dedup.claim(surface, &key) {
            tracing::debug!(target: "notify", surface = surface.0, key = %key, "alert already shown");
            return DeliveryOutcome::Suppressed;
        }

        self.deliver(Some(surface), &Alert::from_result(record, result)).await
    }

    pub async fn deliver(&self, surface: Option<SurfaceId>, alert: &Alert) -> DeliveryOutcome {
        match self.channel.deliver(surface, alert).await {
            Ok(delivery) => {
                let outcome = DeliveryOutcome::from(delivery);
                tracing::info!(
                    target: "notify",
                    surface = surface.map(|s| s.0),
                    risk_level = %alert.level,
                    outcome = ?outcome,
                    "risk alert delivered"
                );
                outcome
            }
            Err(err) => {
                tracing::warn!(
                    target: "notify",
                    surface = surface.map(|s| s.0),
                    error = %err,
                    "risk alert could not be delivered"
                );
                DeliveryOutcome::Failed {
                    error: err.to_string(),
                }
            }
        }
    }
}
