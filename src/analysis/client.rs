use reqwest::{Client, StatusCode};

use crate::{
    config::{AnalysisConfig, Settings},
    domain::{AnalysisResult, ContentRecord},
};

use super::error::{AnalysisError, HostFailure, HostFailureKind};

pub const ANALYZE_PATH: &str = "/analyze-email";

#[derive(Clone)]
pub struct AnalysisClient {
    http: Client,
    config: AnalysisConfig,
}

enum AttemptError {
    NextHost(HostFailure),
    Abort(AnalysisError),
}

impl AnalysisClient {
    pub fn new(http: Client, config: AnalysisConfig) -> Self {
        Self { http, config }
    }

    pub fn candidate_hosts(&self, primary: &str) -> Vec<String> {
        let [first, second] = &self.config.loopback_hosts;
        let mut hosts = vec![primary.to_string()];
        if primary == first {
            hosts.push(second.clone());
        } else if primary == second {
            hosts.push(first.clone());
        }
        let mut seen = std::collections::HashSet::new();
        hosts.retain(|host| seen.insert(host.clone()));
        hosts
    }

    pub async fn analyze(
        &self,
        record: &ContentRecord,
        settings: &Settings,
    ) -> Result<AnalysisResult, AnalysisError> {
        let mut attempts = Vec::new();

        for host in self.candidate_hosts(&settings.api_base_url) {
            match self.attempt(&host, record).await {
                Ok(result) => {
                    tracing::info!(
                        target: "analysis",
                        host = %host,
                        risk_score = result.risk_score,
                        risk_level = %result.risk_level,
                        "analysis completed"
                    );
                    return Ok(result);
                }
                Err(AttemptError::NextHost(failure)) => {
                    tracing::warn!(
                        target: "analysis",
                        host = %host,
                        issue = failure.kind.label(),
                        error = %failure,
                        "analysis host failed; trying next candidate"
                    );
                    attempts.push(failure);
                }
                Err(AttemptError::Abort(err)) => {
                    tracing::warn!(target: "analysis", host = %host, error = %err, "analysis rejected");
                    return Err(err);
                }
            }
        }

        let err = AnalysisError::Exhausted { attempts };
        if err.saw_forbidden() {
            tracing::warn!(
                target: "analysis",
                "a candidate host answered 403; the service may be refusing this client"
            );
        }
        Err(err)
    }

    async fn attempt(&self, host: &str, record: &ContentRecord) -> Result<AnalysisResult, AttemptError> {
        let url = format!("{host}{ANALYZE_PATH}");
        let response = self
            .http
            .post(&url)
            .timeout(self.config.request_timeout)
            .json(record)
            .send()
            .await
            .map_err(|err| AttemptError::NextHost(transport_failure(host, &err)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or_default().to_string()
            } else {
                body
            };
            let message = format!("API error {} from {host}: {body}", status.as_u16());
            return Err(match status {
                StatusCode::NOT_FOUND => AttemptError::NextHost(HostFailure {
                    host: host.to_string(),
                    kind: HostFailureKind::NotFound,
                    message,
                }),
                StatusCode::FORBIDDEN => AttemptError::NextHost(HostFailure {
                    host: host.to_string(),
                    kind: HostFailureKind::Forbidden,
                    message,
                }),
                _ => AttemptError::Abort(AnalysisError::Status {
                    host: host.to_string(),
                    status: status.as_u16(),
                    body,
                }),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| AttemptError::NextHost(transport_failure(host, &err)))?;
        serde_json::from_slice::<AnalysisResult>(&bytes).map_err(|err| {
            AttemptError::NextHost(HostFailure {
                host: host.to_string(),
                kind: HostFailureKind::Decode,
                message: format!("malformed response from {host}: {err}"),
            })
        })
    }
}

fn transport_failure(host: &str, err: &reqwest::Error) -> HostFailure {
    let kind = if err.is_timeout() {
        HostFailureKind::Timeout
    } else if err.is_connect() {
        HostFailureKind::Connect
    } else {
        HostFailureKind::Transport
    };
    HostFailure {
        host: host.to_string(),
        kind,
        message: format!("request to {host} failed: {err}"),
    }
}
