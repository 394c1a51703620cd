use chrono::Utc;
use serde::Serialize;

use crate::pipeline::ReasonCode;
use crate::snapshot::RequestSnapshot;

const SNIPPET_MAX: usize = 300;

/// One structured record per terminal decision: when, why, and for whom.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub time: String,
    pub origin: &'static str,
    pub client: String,
    pub method: String,
    pub path: String,
    pub user_agent: String,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl AuditEvent {
    pub fn from_snapshot(
        snapshot: &RequestSnapshot,
        reason: ReasonCode,
        score: Option<f64>,
    ) -> Self {
        let mut snippet = snapshot.body_text().into_owned();
        if snippet.len() > SNIPPET_MAX {
            let mut cap = SNIPPET_MAX;
            while !snippet.is_char_boundary(cap) {
                cap -= 1;
            }
            snippet.truncate(cap);
        }

        Self {
            time: Utc::now().to_rfc3339(),
            origin: reason.as_str(),
            client: snapshot.client_identity(),
            method: snapshot.method.clone(),
            path: snapshot.path.clone(),
            user_agent: snapshot.user_agent().unwrap_or_default().to_string(),
            snippet,
            score,
        }
    }
}

/// Destination for decision events. Delivery is fire-and-forget:
/// implementations swallow their own failures, and a sink must never abort
/// the request it is describing.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Default sink: one JSON line per event through the `log` facade.
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, event: &AuditEvent) {
        match serde_json::to_string(event) {
            Ok(line) => log::warn!(target: "microshield::audit", "{line}"),
            Err(err) => log::error!("audit event serialization failed: {err}"),
        }
    }
}
