use std::{pin::Pin, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::Mutex,
    task::JoinSet,
    time::timeout,
};

use crate::{
    config::settings::{read_api_base, read_domains, write_api_base, write_domains},
    db::kv::keys,
    infrastructure::shutdown::{ShutdownListener, ShutdownReason},
    notify::{SurfaceMessage, SurfaceMessenger},
    tasks::{ChangeDebouncer, Monitor, PendingChange},
};

use super::protocol::{parse_line, HostReply, HostRequest};

type Writer = Pin<Box<dyn AsyncWrite + Send>>;

pub struct HostOutput {
    writer: Mutex<Writer>,
}

impl HostOutput {
    pub fn new<W: AsyncWrite + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Mutex::new(Box::pin(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }

    pub async fn write_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let mut line = serde_json::to_vec(value)?;
        line.push(b'\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await.context("failed to write host output")?;
        writer.flush().await?;
        Ok(())
    }
}

impl SurfaceMessenger for HostOutput {
    fn send(&self, message: SurfaceMessage) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            tracing::debug!(target: "bridge", surface = message.surface().0, "surface message");
            self.write_json(&message).await
        })
    }
}

pub struct HostBridge {
    monitor: Arc<Monitor>,
    debouncer: Arc<ChangeDebouncer<PendingChange>>,
    output: Arc<HostOutput>,
}

impl HostBridge {
    pub fn new(
        monitor: Arc<Monitor>,
        debouncer: Arc<ChangeDebouncer<PendingChange>>,
        output: Arc<HostOutput>,
    ) -> Self {
        Self {
            monitor,
            debouncer,
            output,
        }
    }

    pub async fn run<R>(
        self: Arc<Self>,
        mut input: R,
        mut shutdown: ShutdownListener,
        grace: Duration,
    ) -> Result<ShutdownReason>
    where
        R: AsyncBufRead + Unpin,
    {
        // read_until keeps partial reads in buf if another branch wins.
        let mut buf = Vec::new();
        let mut in_flight = JoinSet::new();

        let reason = loop {
            tokio::select! {
                reason = shutdown.notified() => break reason,
                read = input.read_until(b'\n', &mut buf) => {
                    let read = read.context("failed to read host input")?;
                    if read == 0 && buf.is_empty() {
                        tracing::info!(target: "bridge", "host input closed");
                        break ShutdownReason::InputClosed;
                    }
                    let raw = std::mem::take(&mut buf);
                    self.accept_raw(raw, &mut in_flight).await;
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(err) = joined {
                        tracing::error!(target: "bridge", error = %err, "request task failed");
                    }
                }
            }
        };

        if !in_flight.is_empty() {
            let pending = in_flight.len();
            let drained = timeout(grace, async {
                while in_flight.join_next().await.is_some() {}
            })
            .await;
            if drained.is_err() {
                tracing::warn!(
                    target: "bridge",
                    pending,
                    "requests did not finish within {:?}; aborting",
                    grace
                );
                in_flight.abort_all();
            }
        }
        Ok(reason)
    }

    async fn accept_raw(self: &Arc<Self>, mut raw: Vec<u8>, in_flight: &mut JoinSet<()>) {
        while matches!(raw.last(), Some(b'\n' | b'\r')) {
            raw.pop();
        }
        match String::from_utf8(raw) {
            Ok(line) if line.trim().is_empty() => {}
            Ok(line) => self.accept(line, in_flight).await,
            Err(err) => {
                tracing::warn!(
                    target: "bridge",
                    error = %err.utf8_error(),
                    bytes = err.as_bytes().len(),
                    "host request is not valid UTF-8"
                );
                let message = format!("invalid request: line is not valid UTF-8 ({})", err.utf8_error());
                self.reply(HostReply::failure(None, message)).await;
            }
        }
    }

    async fn accept(self: &Arc<Self>, line: String, in_flight: &mut JoinSet<()>) {
        let parsed = parse_line(&line);
        let request = match parsed.request {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(target: "bridge", error = %err, line = %line, "unreadable host request");
                self.reply(HostReply::failure(parsed.id, format!("invalid request: {err}")))
                    .await;
                return;
            }
        };

        if request.is_inline() {
            if let Some(reply) = self.handle(parsed.id, request).await {
                self.reply(reply).await;
            }
            return;
        }

        let bridge = Arc::clone(self);
        let id = parsed.id;
        in_flight.spawn(async move {
            if let Some(reply) = bridge.handle(id, request).await {
                bridge.reply(reply).await;
            }
        });
    }

    async fn reply(&self, reply: HostReply) {
        if let Err(err) = self.output.write_json(&reply).await {
            tracing::error!(target: "bridge", error = %err, id = reply.id, "failed to send reply");
        }
    }

    #[cfg(test)]
    pub async fn handle_line(&self, line: &str) -> Option<HostReply> {
        let parsed = parse_line(line);
        match parsed.request {
            Ok(request) => self.handle(parsed.id, request).await,
            Err(err) => Some(HostReply::failure(parsed.id, format!("invalid request: {err}"))),
        }
    }

    pub async fn handle(&self, id: Option<u64>, request: HostRequest) -> Option<HostReply> {
        let kind = request.kind();
        let silent = request.is_inline() && id.is_none();
        tracing::debug!(target: "bridge", kind, id, "host request");

        let reply = match self.dispatch(request).await {
            Ok(body) => HostReply {
                body,
                ..HostReply::success(id)
            },
            Err(err) => {
                let message = format!("{err:#}");
                tracing::warn!(target: "bridge", kind, error = %message, "host request failed");
                HostReply::failure(id, message)
            }
        };
        (!silent).then_some(reply)
    }

    async fn dispatch(&self, request: HostRequest) -> Result<Map<String, Value>> {
        let store = self.monitor.store();
        let reply = HostReply::success(None);

        let reply = match request {
            HostRequest::ContentChanged {
                surface,
                payload,
                change_token,
            } => {
                let restarted = self.debouncer.is_pending(surface);
                tracing::debug!(target: "bridge", surface = surface.0, restarted, "content changed");
                self.debouncer.trigger(
                    surface,
                    PendingChange {
                        record: payload.normalized(),
                        change_token,
                    },
                );
                reply
            }
            HostRequest::SurfaceClosed { surface } => {
                self.debouncer.forget(surface);
                self.monitor.forget_surface(surface);
                reply
            }
            HostRequest::AnalyzeEmail { payload } => {
                let result = self.monitor.analyze_on_demand(&payload.normalized()).await?;
                reply.with("result", json!(result))
            }
            HostRequest::AutoAnalyzeEmail {
                surface,
                payload,
                change_token,
            } => {
                let analysis = self
                    .monitor
                    .run_auto_analysis(surface, &payload.normalized(), change_token.as_deref())
                    .await?;
                reply
                    .with("result", json!(analysis.result))
                    .with("delivery", json!(analysis.delivery))
            }
            HostRequest::GetAllowlist => {
                reply.with("domains", json!(read_domains(store, keys::ALLOWLIST_DOMAINS).await?))
            }
            HostRequest::SetAllowlist { domains } => reply.with(
                "domains",
                json!(write_domains(store, keys::ALLOWLIST_DOMAINS, domains).await?),
            ),
            HostRequest::GetBlocklist => {
                reply.with("domains", json!(read_domains(store, keys::BLOCKLIST_DOMAINS).await?))
            }
            HostRequest::SetBlocklist { domains } => reply.with(
                "domains",
                json!(write_domains(store, keys::BLOCKLIST_DOMAINS, domains).await?),
            ),
            HostRequest::GetApiBase => reply.with("apiBaseUrl", json!(read_api_base(store).await?)),
            HostRequest::SetApiBase { api_base_url } => {
                reply.with("apiBaseUrl", json!(write_api_base(store, &api_base_url).await?))
            }
            HostRequest::GetLatestAnalysis => {
                reply.with("latestAnalysis", json!(self.monitor.latest_analysis().await?))
            }
            HostRequest::TestNotification { surface } => {
                let outcome = self.monitor.send_test_notification(surface).await;
                reply.with("delivery", json!(outcome))
            }
        };
        Ok(reply.body)
    }
}
