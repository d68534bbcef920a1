use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").expect("valid email regex")
});

const FALLBACK_SOURCE_LABEL: &str = "Current page";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "gmail", alias = "email")]
    Email,
    #[default]
    #[serde(rename = "webpage")]
    Webpage,
}

impl Source {
    pub fn is_passive(&self) -> bool {
        matches!(self, Source::Webpage)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    #[serde(default)]
    pub extension: String,
    #[serde(default)]
    pub size_kb: f64,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
}

fn default_mime_type() -> String {
    "application/octet-stream".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    #[serde(default)]
    pub sender_email: String,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body_text: String,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(rename = "page_source", default)]
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("content has no sender")]
    MissingSender,
    #[error("content has no subject")]
    MissingSubject,
    #[error("content has no body text")]
    MissingBody,
    #[error("page body too short to analyze ({len} < {min} chars)")]
    BodyTooShort { len: usize, min: usize },
}

impl ContentRecord {
    pub fn normalized(mut self) -> Self {
        self.sender_email = extract_sender_email(&self.sender_email);
        self.sender_name = self.sender_name.trim().to_string();

        let mut seen = HashSet::with_capacity(self.urls.len());
        self.urls.retain(|url| !url.is_empty() && seen.insert(url.clone()));

        for attachment in &mut self.attachments {
            attachment.extension = attachment
                .extension
                .trim()
                .trim_start_matches('.')
                .to_lowercase();
        }
        self
    }

    pub fn check_monitorable(&self, min_webpage_body_chars: usize) -> Result<(), ExtractionError> {
        if self.sender_email.trim().is_empty() {
            return Err(ExtractionError::MissingSender);
        }
        if self.subject.trim().is_empty() {
            return Err(ExtractionError::MissingSubject);
        }
        if self.body_text.trim().is_empty() {
            return Err(ExtractionError::MissingBody);
        }
        if self.source == Source::Webpage {
            let len = self.body_text.chars().count();
            if len < min_webpage_body_chars {
                return Err(ExtractionError::BodyTooShort {
                    len,
                    min: min_webpage_body_chars,
                });
            }
        }
        Ok(())
    }

    pub fn sender_domain(&self) -> String {
        sender_domain(&self.sender_email)
    }

    pub fn display_source(&self) -> &str {
        [
            self.subject.as_str(),
            self.sender_name.as_str(),
            self.sender_email.as_str(),
        ]
        .into_iter()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or(FALLBACK_SOURCE_LABEL)
    }
}

pub fn sender_domain(email: &str) -> String {
    match email.rsplit_once('@') {
        Some((_, domain)) => domain.trim().to_lowercase(),
        None => String::new(),
    }
}

pub fn extract_sender_email(raw: &str) -> String {
    EMAIL_REGEX
        .find(raw)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}
