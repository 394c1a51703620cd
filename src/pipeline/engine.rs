use futures::FutureExt;
use log::{debug, error, warn};
use rand::Rng;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use super::{
    extract, signature, AdmissionGate, Decision, ReasonCode, RiskScorer, StaticRuleEngine,
    VerdictCache,
};
use crate::audit::{AuditEvent, AuditSink, LogAuditSink};
use crate::config::{Mode, PipelineConfig};
use crate::metrics::MetricsCollector;
use crate::pipeline::scorer::HttpRiskScorer;
use crate::snapshot::RequestSnapshot;

/// Per-request orchestrator: admission, static rules, feature extraction,
/// cache, external scoring, and verdict fusion, in that order, with an
/// early return at every terminal state.
///
/// All shared state (cache, admission windows) is owned by the engine
/// instance; independently configured engines coexist in one process.
pub struct DecisionEngine {
    config: PipelineConfig,
    static_rules: StaticRuleEngine,
    admission: AdmissionGate,
    cache: VerdictCache,
    scorer: Arc<dyn RiskScorer>,
    audit: Arc<dyn AuditSink>,
    metrics: Arc<MetricsCollector>,
}

impl DecisionEngine {
    pub fn new(
        config: PipelineConfig,
        scorer: Arc<dyn RiskScorer>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let static_rules = StaticRuleEngine::new(config.static_rules.clone());
        let admission = AdmissionGate::new(&config.admission);
        let cache = VerdictCache::new(
            config.cache.capacity,
            Duration::from_secs(config.cache.ttl_secs),
        );

        Self {
            config,
            static_rules,
            admission,
            cache,
            scorer,
            audit,
            metrics: Arc::new(MetricsCollector::new()),
        }
    }

    /// Engine wired to the HTTP scorer and the log-based audit sink.
    pub fn from_config(config: PipelineConfig) -> Self {
        let scorer = Arc::new(HttpRiskScorer::new(&config.scorer));
        Self::new(config, scorer, Arc::new(LogAuditSink))
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// The admission gate, exposed so hosts can `prune` it periodically.
    pub fn admission(&self) -> &AdmissionGate {
        &self.admission
    }

    /// Classify one request. Never fails: any unexpected fault inside the
    /// pipeline resolves to ALLOW, because a broken security layer must not
    /// take the protected application down with it.
    pub async fn decide(&self, snapshot: &RequestSnapshot) -> Decision {
        match AssertUnwindSafe(self.evaluate(snapshot)).catch_unwind().await {
            Ok(decision) => decision,
            Err(_) => {
                error!(
                    "pipeline fault while classifying {} {}, failing open",
                    snapshot.method, snapshot.path
                );
                self.metrics.record_internal_fault();
                self.audit
                    .record(&AuditEvent::from_snapshot(snapshot, ReasonCode::InternalFault, None));
                Decision::Allow
            }
        }
    }

    async fn evaluate(&self, snapshot: &RequestSnapshot) -> Decision {
        let client = snapshot.client_identity();

        if !self.admission.admit(&client) {
            warn!("throttled {} on {} {}", client, snapshot.method, snapshot.path);
            self.metrics.record_blocked("rate_limit");
            self.audit
                .record(&AuditEvent::from_snapshot(snapshot, ReasonCode::RateLimited, None));
            return Decision::Block {
                status: 429,
                reason: ReasonCode::RateLimited,
            };
        }

        if let Some(rule) = self.static_rules.first_match(snapshot) {
            if self.config.mode == Mode::Protect || self.config.static_rules.block_in_learn {
                warn!(
                    "static rule {} matched on {} {} from {}",
                    rule.label(),
                    snapshot.method,
                    snapshot.path,
                    client
                );
                self.metrics.record_blocked(rule.label());
                self.audit
                    .record(&AuditEvent::from_snapshot(snapshot, ReasonCode::StaticRule, None));
                return Decision::Block {
                    status: 403,
                    reason: ReasonCode::StaticRule,
                };
            }
        }

        let features = extract(snapshot);

        if self.config.mode == Mode::Learn {
            let scorer = Arc::clone(&self.scorer);
            let sample = features.clone();
            tokio::spawn(async move {
                scorer.submit_sample(&sample).await;
            });
            debug!("learn mode: observed {} {}", snapshot.method, snapshot.path);
            self.metrics.record_allowed();
            return Decision::Allow;
        }

        if self.config.sample_rate > 1
            && rand::thread_rng().gen_range(0..self.config.sample_rate) != 0
        {
            debug!("sampled out {} {}", snapshot.method, snapshot.path);
            self.metrics.record_allowed();
            return Decision::Allow;
        }

        let key = signature(&features);

        if let Some(verdict) = self.cache.get(&key) {
            self.metrics.record_cache_hit();
            if verdict.level.blocks() {
                self.metrics.record_blocked("ai_cache");
                self.audit.record(&AuditEvent::from_snapshot(
                    snapshot,
                    ReasonCode::AiCache,
                    Some(verdict.score),
                ));
                return Decision::Block {
                    status: 403,
                    reason: ReasonCode::AiCache,
                };
            }
            self.metrics.record_allowed();
            self.audit.record(&AuditEvent::from_snapshot(
                snapshot,
                ReasonCode::AiCache,
                Some(verdict.score),
            ));
            return Decision::Allow;
        }
        self.metrics.record_cache_miss();

        match self.scorer.classify(&features).await {
            Err(err) => {
                self.metrics.record_scorer_error(err.kind());
                if self.config.fail_open {
                    warn!("scorer unavailable ({err}), failing open");
                    self.metrics.record_allowed();
                    self.audit.record(&AuditEvent::from_snapshot(
                        snapshot,
                        ReasonCode::AiErrorFailOpen,
                        None,
                    ));
                    Decision::Allow
                } else {
                    warn!("scorer unavailable ({err}), failing closed");
                    self.metrics.record_blocked("ai_error");
                    self.audit.record(&AuditEvent::from_snapshot(
                        snapshot,
                        ReasonCode::AiErrorFailClose,
                        None,
                    ));
                    Decision::Block {
                        status: 503,
                        reason: ReasonCode::AiErrorFailClose,
                    }
                }
            }
            Ok(verdict) => {
                self.cache.set(key, verdict.clone());
                if verdict.level.blocks() {
                    self.metrics.record_blocked("ai_model");
                    self.audit.record(&AuditEvent::from_snapshot(
                        snapshot,
                        ReasonCode::AiModel,
                        Some(verdict.score),
                    ));
                    Decision::Block {
                        status: 403,
                        reason: ReasonCode::AiModel,
                    }
                } else {
                    self.metrics.record_allowed();
                    self.audit.record(&AuditEvent::from_snapshot(
                        snapshot,
                        ReasonCode::AiModel,
                        Some(verdict.score),
                    ));
                    Decision::Allow
                }
            }
        }
    }
}
