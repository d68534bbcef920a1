use std::collections::BTreeMap;

use crate::{
    config::Settings,
    domain::{AnalysisResult, ContentRecord, RiskLevel},
};

/// `None` means the record goes to the analysis service.
pub fn evaluate(record: &ContentRecord, settings: &Settings) -> Option<AnalysisResult> {
    let domain = record.sender_domain();

    if settings.blocklist.contains(&domain) {
        tracing::info!(target: "analysis", domain = %domain, "sender domain is blocklisted");
        return Some(blocked(&domain));
    }
    if settings.allowlist.contains(&domain) {
        tracing::info!(target: "analysis", domain = %domain, "sender domain is allow-listed");
        return Some(allowed(&domain));
    }
    None
}

fn blocked(domain: &str) -> AnalysisResult {
    AnalysisResult {
        risk_score: 100,
        risk_level: RiskLevel::High,
        reasons: vec![format!(
            "{domain} is blocklisted. Treat this as highly suspicious."
        )],
        indicators: Some(indicators(100.0)),
        recommended_action: Some("Do not interact with this email.".to_string()),
    }
}

fn allowed(domain: &str) -> AnalysisResult {
    AnalysisResult {
        risk_score: 0,
        risk_level: RiskLevel::Low,
        reasons: vec![format!("{domain} is allow-listed. Analysis skipped.")],
        indicators: Some(indicators(0.0)),
        recommended_action: Some("Sender is trusted by your local allow-list.".to_string()),
    }
}

fn indicators(sender: f64) -> BTreeMap<String, f64> {
    [("text", 0.0), ("url", 0.0), ("sender", sender), ("attachment", 0.0)]
        .into_iter()
        .map(|(name, score)| (name.to_string(), score))
        .collect()
}
