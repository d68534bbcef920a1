use anyhow::Result;
use futures::future::BoxFuture;
use serde::Serialize;

use crate::domain::SurfaceId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BannerPayload {
    pub level: String,
    pub score: u8,
    pub reason: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurfaceMessage {
    SetBadge {
        surface: SurfaceId,
        text: String,
        color: String,
    },
    ShowRiskBanner {
        surface: SurfaceId,
        payload: BannerPayload,
    },
}

impl SurfaceMessage {
    pub fn surface(&self) -> SurfaceId {
        match self {
            SurfaceMessage::SetBadge { surface, .. }
            | SurfaceMessage::ShowRiskBanner { surface, .. } => *surface,
        }
    }
}

pub trait SurfaceMessenger: Send + Sync {
    fn send(&self, message: SurfaceMessage) -> BoxFuture<'_, Result<()>>;
}
