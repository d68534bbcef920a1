use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{ContentRecord, SurfaceId};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostRequest {
    ContentChanged {
        surface: SurfaceId,
        payload: ContentRecord,
        #[serde(default, alias = "fingerprint")]
        change_token: Option<String>,
    },
    SurfaceClosed {
        surface: SurfaceId,
    },
    AnalyzeEmail {
        payload: ContentRecord,
    },
    AutoAnalyzeEmail {
        #[serde(default)]
        surface: Option<SurfaceId>,
        payload: ContentRecord,
        #[serde(default, alias = "fingerprint")]
        change_token: Option<String>,
    },
    GetAllowlist,
    SetAllowlist {
        #[serde(default)]
        domains: Vec<String>,
    },
    GetBlocklist,
    SetBlocklist {
        #[serde(default)]
        domains: Vec<String>,
    },
    GetApiBase,
    SetApiBase {
        #[serde(default, alias = "apiBaseUrl")]
        api_base_url: String,
    },
    GetLatestAnalysis,
    TestNotification {
        #[serde(default)]
        surface: Option<SurfaceId>,
    },
}

impl HostRequest {
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            HostRequest::ContentChanged { .. } | HostRequest::SurfaceClosed { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            HostRequest::ContentChanged { .. } => "CONTENT_CHANGED",
            HostRequest::SurfaceClosed { .. } => "SURFACE_CLOSED",
            HostRequest::AnalyzeEmail { .. } => "ANALYZE_EMAIL",
            HostRequest::AutoAnalyzeEmail { .. } => "AUTO_ANALYZE_EMAIL",
            HostRequest::GetAllowlist => "GET_ALLOWLIST",
            HostRequest::SetAllowlist { .. } => "SET_ALLOWLIST",
            HostRequest::GetBlocklist => "GET_BLOCKLIST",
            HostRequest::SetBlocklist { .. } => "SET_BLOCKLIST",
            HostRequest::GetApiBase => "GET_API_BASE",
            HostRequest::SetApiBase { .. } => "SET_API_BASE",
            HostRequest::GetLatestAnalysis => "GET_LATEST_ANALYSIS",
            HostRequest::TestNotification { .. } => "TEST_NOTIFICATION",
        }
    }
}

#[derive(Debug)]
pub struct ParsedLine {
    pub id: Option<u64>,
    pub request: Result<HostRequest, serde_json::Error>,
}

pub fn parse_line(line: &str) -> ParsedLine {
    let mut value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(err) => {
            return ParsedLine {
                id: None,
                request: Err(err),
            }
        }
    };
    let id = value
        .as_object_mut()
        .and_then(|object| object.remove("id"))
        .and_then(|id| id.as_u64());
    ParsedLine {
        id,
        request: serde_json::from_value(value),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostReply {
    pub id: Option<u64>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl HostReply {
    pub fn success(id: Option<u64>) -> Self {
        Self {
            id,
            ok: true,
            error: None,
            body: Map::new(),
        }
    }

    pub fn failure(id: Option<u64>, error: impl Display) -> Self {
        Self {
            id,
            ok: false,
            error: Some(error.to_string()),
            body: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.body.insert(key.to_string(), value);
        self
    }
}
