use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AnalysisResult, ContentRecord, SurfaceId};

use super::kv::{self, keys, KeyValueStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestAnalysis {
    pub payload: ContentRecord,
    pub result: AnalysisResult,
    #[serde(rename = "analyzedAt")]
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ResultStore {
    store: Arc<dyn KeyValueStore>,
}

impl ResultStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn write(
        &self,
        surface: Option<SurfaceId>,
        record: &ContentRecord,
        result: &AnalysisResult,
        analyzed_at: DateTime<Utc>,
    ) -> Result<()> {
        let latest = LatestAnalysis {
            payload: record.clone(),
            result: result.clone(),
            analyzed_at,
        };
        kv::set_json(self.store.as_ref(), keys::LATEST_ANALYSIS, &latest).await?;
        tracing::debug!(
            target: "db",
            surface = surface.map(|s| s.0),
            risk_level = %result.risk_level,
            "latest analysis stored"
        );
        Ok(())
    }

    pub async fn read_latest(&self) -> Result<Option<LatestAnalysis>> {
        kv::get_json(self.store.as_ref(), keys::LATEST_ANALYSIS).await
    }
}
