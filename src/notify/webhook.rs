use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::Serialize;
use url::Url;
use uuid::Uuid;

use super::channel::{NotificationBackend, NotificationError, NotificationRequest};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

pub struct WebhookNotifier {
    http: Client,
    url: Option<Url>,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    id: &'a str,
    #[serde(flatten)]
    request: &'a NotificationRequest,
}

impl WebhookNotifier {
    pub fn new(http: Client, url: Option<Url>) -> Self {
        Self { http, url }
    }
}

impl NotificationBackend for WebhookNotifier {
    fn create<'a>(
        &'a self,
        request: &'a NotificationRequest,
    ) -> BoxFuture<'a, Result<String, NotificationError>> {
        Box::pin(async move {
            let url = self
                .url
                .as_ref()
                .ok_or_else(|| NotificationError::Unavailable("notifications are disabled".into()))?;

            let id = format!("phish_guard_{}", Uuid::new_v4().simple());
            let response = self
                .http
                .post(url.clone())
                .timeout(WEBHOOK_TIMEOUT)
                .json(&WebhookPayload { id: &id, request })
                .send()
                .await
                .map_err(|err| NotificationError::Unavailable(err.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(NotificationError::Unavailable(format!(
                    "notification relay answered {}",
                    status.as_u16()
                )));
            }
            Ok(id)
        })
    }
}
