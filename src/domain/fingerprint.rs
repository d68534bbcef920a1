use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ContentRecord;

const BODY_PREFIX_CHARS: usize = 400;
const FINGERPRINT_BYTES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sender email, subject, first 400 body chars and urls.
pub fn fingerprint(record: &ContentRecord) -> Fingerprint {
    let body_end = record
        .body_text
        .char_indices()
        .nth(BODY_PREFIX_CHARS)
        .map(|(idx, _)| idx)
        .unwrap_or(record.body_text.len());

    let mut hasher = Sha256::new();
    write_field(&mut hasher, &record.sender_email);
    write_field(&mut hasher, &record.subject);
    write_field(&mut hasher, &record.body_text[..body_end]);
    hasher.update((record.urls.len() as u64).to_le_bytes());
    for url in &record.urls {
        write_field(&mut hasher, url);
    }

    let digest = hasher.finalize();
    Fingerprint(hex::encode(&digest[..FINGERPRINT_BYTES]))
}

fn write_field(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{record::Attachment, Source};

    fn record() -> ContentRecord {
        ContentRecord {
            sender_email: "alerts@bank.example".into(),
            sender_name: "Bank".into(),
            subject: "Verify your account".into(),
            body_text: "Please verify your account within 24 hours.".into(),
            urls: vec!["https://bank.example/login".into()],
            attachments: vec![],
            source: Source::Email,
        }
    }

    #[test]
    fn fingerprint_has_fixed_length() {
        let fp = fingerprint(&record()).to_string();
        assert_eq!(fp.len(), FINGERPRINT_BYTES * 2);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn ignores_fields_outside_the_derivation_inputs() {
        let base = record();
        let mut other = base.clone();
        other.sender_name = "Someone else".into();
        other.source = Source::Webpage;
        other.attachments.push(Attachment {
            filename: "a.zip".into(),
            extension: "zip".into(),
            size_kb: 3.0,
            mime_type: "application/zip".into(),
        });
        assert_eq!(fingerprint(&base), fingerprint(&other));
    }

    #[test]
    fn only_first_400_body_chars_count() {
        let mut a = record();
        let mut b = record();
        let prefix = "é".repeat(BODY_PREFIX_CHARS);
        a.body_text = format!("{prefix}tail one");
        b.body_text = format!("{prefix}a completely different tail");
        assert_eq!(fingerprint(&a), fingerprint(&b));

        b.body_text = format!("x{prefix}");
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn each_input_field_changes_the_fingerprint() {
        let base = record();
        let mut variants = Vec::new();

        let mut v = base.clone();
        v.sender_email = "alerts@bank-example.net".into();
        variants.push(v);

        let mut v = base.clone();
        v.subject = "Verify your account!".into();
        variants.push(v);

        let mut v = base.clone();
        v.body_text.push('.');
        variants.push(v);

        let mut v = base.clone();
        v.urls.push("https://evil.example".into());
        variants.push(v);

        let mut v = base.clone();
        v.urls.clear();
        variants.push(v);

        let mut fingerprints = vec![fingerprint(&base)];
        fingerprints.extend(variants.iter().map(fingerprint));
        for (i, a) in fingerprints.iter().enumerate() {
            for b in &fingerprints[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn field_boundaries_are_not_ambiguous() {
        let mut a = record();
        let mut b = record();
        a.sender_email = "a@b.c||x".into();
        a.subject = "y".into();
        b.sender_email = "a@b.c".into();
        b.subject = "x||y".into();
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
