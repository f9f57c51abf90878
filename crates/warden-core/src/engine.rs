//! The policy engine: the single choke point every tool call passes
//! through before it executes.
//!
//! Evaluation algorithm:
//!
//! 1. Select the rules whose selector matches the request's tool. Rules
//!    were sorted by ascending priority once, at construction.
//! 2. Walk the selected rules in order. `Ok(None)` means "no opinion";
//!    a fault (`Err`) is recorded and treated the same way.
//! 3. First `deny` wins and stops the walk — later, lower-priority rules
//!    must not be allowed to overrule an explicit denial, and stopping
//!    early avoids unnecessary work (e.g. rate-limit store reads) once the
//!    call is already refused.
//! 4. The first `quarantine` is retained but does not stop the walk, since
//!    a later rule may still escalate to `deny`.
//! 5. No deny, no quarantine → `allow` with reason code `ALLOWED`.
//!
//! `evaluate` is infallible: a misbehaving rule must not crash the caller,
//! because the caller cannot safely default to either allow or deny
//! without a recorded reason.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Instant;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use warden_contracts::{
    log::DecisionRow,
    policy::{AuthorityLevel, InputSource, PolicyAction, PolicyDecision, RuleVerdict},
    request::PolicyRequest,
};

use crate::traits::{DecisionStore, PolicyRule};

/// Derive the trust tier of a request from who originated its turn.
///
/// Pure function, total over all input sources plus `None`. Anything not
/// positively identified as the agent's own reasoning or the system lands
/// in `External` — fail safe toward the least-trusted tier.
pub fn derive_authority_level(source: Option<InputSource>) -> AuthorityLevel {
    match source {
        None | Some(InputSource::Heartbeat) => AuthorityLevel::External,
        Some(InputSource::Creator) | Some(InputSource::Agent) => AuthorityLevel::Agent,
        Some(InputSource::System) | Some(InputSource::Wakeup) => AuthorityLevel::System,
    }
}

/// SHA-256 over the canonical JSON encoding of the arguments.
///
/// serde_json stores object keys sorted, so two argument sets that differ
/// only in key order hash identically. Persisting the hash instead of the
/// raw arguments keeps secrets out of the audit trail while still making
/// identical calls auditable as identical.
///
/// # Panics
///
/// Panics if `args` cannot be serialized — which cannot happen for a value
/// that was itself parsed from JSON.
pub fn hash_args(args: &serde_json::Value) -> String {
    let canonical =
        serde_json::to_vec(args).expect("JSON value must always be serializable back to JSON");

    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    hex::encode(hasher.finalize())
}

/// The orchestrator that composes rule verdicts into one decision.
///
/// Construct once at startup with the full rule set and the decision log;
/// both are immutable for the engine's lifetime.
pub struct PolicyEngine {
    /// All rules, sorted by ascending priority. The sort is stable, so
    /// rules sharing a priority keep their registration order.
    rules: Vec<Box<dyn PolicyRule>>,
    store: Arc<dyn DecisionStore>,
    /// Swallowed decision-log write failures. Silent log loss is itself a
    /// risk; this counter makes it observable instead of just discarded.
    log_failures: AtomicU64,
    /// Rule-evaluation faults treated as "no opinion".
    rule_faults: AtomicU64,
}

impl PolicyEngine {
    /// Build an engine over `rules`, persisting decisions to `store`.
    pub fn new(mut rules: Vec<Box<dyn PolicyRule>>, store: Arc<dyn DecisionStore>) -> Self {
        rules.sort_by_key(|r| r.priority());
        Self {
            rules,
            store,
            log_failures: AtomicU64::new(0),
            rule_faults: AtomicU64::new(0),
        }
    }

    /// Evaluate a tool-call request against all applicable rules.
    ///
    /// Never fails. A rule fault is logged, counted, and treated as "no
    /// opinion"; the remaining rules still run.
    pub fn evaluate(&self, request: &PolicyRequest) -> PolicyDecision {
        let started = Instant::now();

        debug!(
            tool = %request.tool.name,
            source = ?request.turn.input_source,
            "evaluating policy"
        );

        let mut rules_evaluated: Vec<String> = Vec::new();
        let mut rules_triggered: Vec<String> = Vec::new();

        // Accumulator for the composed outcome. `None` reads as allow-so-far.
        // Deny overwrites unconditionally and ends the walk; quarantine only
        // fills an empty slot, so the first quarantine's reason survives.
        let mut outcome: Option<RuleVerdict> = None;

        for rule in self.rules.iter().filter(|r| r.applies_to().matches(&request.tool)) {
            rules_evaluated.push(rule.id().to_string());

            let result = match rule.evaluate(request) {
                Ok(result) => result,
                Err(err) => {
                    self.rule_faults.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        rule = rule.id(),
                        tool = %request.tool.name,
                        error = %err,
                        "rule evaluation fault; treating as no opinion"
                    );
                    continue;
                }
            };

            let Some(verdict) = result else { continue };
            rules_triggered.push(verdict.rule.clone());

            match verdict.action {
                PolicyAction::Deny => {
                    // First deny wins.
                    outcome = Some(verdict);
                    break;
                }
                PolicyAction::Quarantine => {
                    if outcome.is_none() {
                        outcome = Some(verdict);
                    }
                }
                // Rules approve by silence; an explicit allow carries no
                // weight in composition.
                PolicyAction::Allow => {}
            }
        }

        let (action, reason_code, message) = match outcome {
            Some(verdict) => (verdict.action, verdict.reason_code, verdict.message),
            None => (
                PolicyAction::Allow,
                "ALLOWED".to_string(),
                "All policy checks passed".to_string(),
            ),
        };

        let decision = PolicyDecision {
            action,
            reason_code,
            message,
            risk_level: request.tool.risk_level,
            authority_level: derive_authority_level(request.turn.input_source),
            tool_name: request.tool.name.clone(),
            args_hash: hash_args(&request.args),
            rules_evaluated,
            rules_triggered,
            latency_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        };

        if decision.action == PolicyAction::Allow {
            debug!(tool = %decision.tool_name, "policy allowed tool call");
        } else {
            warn!(
                tool = %decision.tool_name,
                action = ?decision.action,
                reason = %decision.reason_code,
                "policy blocked or flagged tool call"
            );
        }

        decision
    }

    /// Persist a decision as an audit row.
    ///
    /// This is the single place where a store fault is deliberately
    /// discarded: a logging failure must never block or corrupt tool
    /// execution that has already been authorized. The failure is still
    /// counted on `log_failure_count` and logged.
    pub fn log_decision(&self, decision: &PolicyDecision, turn_id: Option<&str>) {
        let row = DecisionRow {
            id: Uuid::new_v4().to_string(),
            turn_id: turn_id.map(str::to_string),
            tool_name: decision.tool_name.clone(),
            args_hash: decision.args_hash.clone(),
            risk_level: decision.risk_level,
            decision: decision.action,
            rules_evaluated: decision.rules_evaluated.clone(),
            rules_triggered: decision.rules_triggered.clone(),
            reason: format!("{}: {}", decision.reason_code, decision.message),
            latency_ms: decision.latency_ms,
            created_at: decision.timestamp,
        };

        if let Err(err) = self.store.insert(&row) {
            self.log_failures.fetch_add(1, Ordering::Relaxed);
            warn!(
                tool = %decision.tool_name,
                error = %err,
                "failed to persist policy decision"
            );
        }
    }

    /// How many decision-log writes have been swallowed.
    pub fn log_failure_count(&self) -> u64 {
        self.log_failures.load(Ordering::Relaxed)
    }

    /// How many rule-evaluation faults have been absorbed.
    pub fn rule_fault_count(&self) -> u64 {
        self.rule_faults.load(Ordering::Relaxed)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use chrono::DateTime;
    use serde_json::json;

    use warden_contracts::{
        error::{WardenError, WardenResult},
        tool::{RiskLevel, ToolCategory, ToolDescriptor, ToolSelector},
        request::TurnContext,
    };

    use super::*;

    // ── Mocks ─────────────────────────────────────────────────────────────────

    /// What a scripted rule does when evaluated.
    enum Script {
        NoOpinion,
        Deny,
        Quarantine,
        Fault,
    }

    /// A rule that follows a fixed script and counts its invocations.
    struct ScriptedRule {
        id: String,
        priority: u32,
        selector: ToolSelector,
        script: Script,
        calls: AtomicUsize,
    }

    impl ScriptedRule {
        fn new(id: &str, priority: u32, script: Script) -> Self {
            Self {
                id: id.to_string(),
                priority,
                selector: ToolSelector::All,
                script,
                calls: AtomicUsize::new(0),
            }
        }

        fn with_selector(mut self, selector: ToolSelector) -> Self {
            self.selector = selector;
            self
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::Relaxed)
        }
    }

    impl PolicyRule for ScriptedRule {
        fn id(&self) -> &str {
            &self.id
        }

        fn description(&self) -> &str {
            "scripted test rule"
        }

        fn priority(&self) -> u32 {
            self.priority
        }

        fn applies_to(&self) -> &ToolSelector {
            &self.selector
        }

        fn evaluate(&self, _request: &PolicyRequest) -> WardenResult<Option<RuleVerdict>> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            match self.script {
                Script::NoOpinion => Ok(None),
                Script::Deny => Ok(Some(RuleVerdict::deny(&self.id, "TEST_DENY", "denied by test"))),
                Script::Quarantine => Ok(Some(RuleVerdict::quarantine(
                    &self.id,
                    "TEST_QUARANTINE",
                    "flagged by test",
                ))),
                Script::Fault => Err(WardenError::RuleFault {
                    rule: self.id.clone(),
                    reason: "scripted fault".to_string(),
                }),
            }
        }
    }

    /// A store that records inserted rows.
    #[derive(Default)]
    struct RecordingStore {
        rows: Mutex<Vec<DecisionRow>>,
    }

    impl DecisionStore for RecordingStore {
        fn insert(&self, row: &DecisionRow) -> WardenResult<()> {
            self.rows.lock().unwrap().push(row.clone());
            Ok(())
        }

        fn count_allowed_since(
            &self,
            _tool_name: &str,
            _since: DateTime<Utc>,
        ) -> WardenResult<u64> {
            Ok(0)
        }

        fn last_allowed_at(&self, _tool_names: &[&str]) -> WardenResult<Option<DateTime<Utc>>> {
            Ok(None)
        }
    }

    /// A store whose writes always fail.
    struct BrokenStore;

    impl DecisionStore for BrokenStore {
        fn insert(&self, _row: &DecisionRow) -> WardenResult<()> {
            Err(WardenError::AuditWrite { reason: "disk full".to_string() })
        }

        fn count_allowed_since(
            &self,
            _tool_name: &str,
            _since: DateTime<Utc>,
        ) -> WardenResult<u64> {
            Err(WardenError::StoreQuery { reason: "offline".to_string() })
        }

        fn last_allowed_at(&self, _tool_names: &[&str]) -> WardenResult<Option<DateTime<Utc>>> {
            Err(WardenError::StoreQuery { reason: "offline".to_string() })
        }
    }

    fn request_for(tool: ToolDescriptor) -> PolicyRequest {
        PolicyRequest::new(
            tool,
            json!({ "amount_cents": 100 }),
            TurnContext { input_source: Some(InputSource::Agent), ..TurnContext::default() },
        )
    }

    fn exec_request() -> PolicyRequest {
        request_for(ToolDescriptor::new("exec", ToolCategory::Vm, RiskLevel::Dangerous))
    }

    // ── 1. Composition: allow when silent ────────────────────────────────────

    #[test]
    fn all_silent_rules_compose_to_allow() {
        let engine = PolicyEngine::new(
            vec![
                Box::new(ScriptedRule::new("a", 10, Script::NoOpinion)),
                Box::new(ScriptedRule::new("b", 20, Script::NoOpinion)),
            ],
            Arc::new(RecordingStore::default()),
        );

        let decision = engine.evaluate(&exec_request());

        assert_eq!(decision.action, PolicyAction::Allow);
        assert_eq!(decision.reason_code, "ALLOWED");
        assert_eq!(decision.rules_evaluated, vec!["a", "b"]);
        assert!(decision.rules_triggered.is_empty());
    }

    // ── 2. First deny wins and short-circuits ────────────────────────────────

    #[test]
    fn first_deny_stops_the_walk() {
        let never_reached = ScriptedRule::new("late", 30, Script::Deny);
        let engine = PolicyEngine::new(
            vec![
                Box::new(ScriptedRule::new("early", 10, Script::NoOpinion)),
                Box::new(ScriptedRule::new("denier", 20, Script::Deny)),
                Box::new(never_reached),
            ],
            Arc::new(RecordingStore::default()),
        );

        let decision = engine.evaluate(&exec_request());

        assert_eq!(decision.action, PolicyAction::Deny);
        assert_eq!(decision.reason_code, "TEST_DENY");
        // The rule ordered after the denier was never invoked.
        assert_eq!(decision.rules_evaluated, vec!["early", "denier"]);
        assert_eq!(decision.rules_triggered, vec!["denier"]);
    }

    #[test]
    fn rules_after_deny_are_not_invoked() {
        let late = Arc::new(ScriptedRule::new("late", 30, Script::NoOpinion));

        // Wrap the shared rule so the engine can own a Box while the test
        // keeps a handle for call counting.
        struct Shared(Arc<ScriptedRule>);
        impl PolicyRule for Shared {
            fn id(&self) -> &str {
                self.0.id()
            }
            fn description(&self) -> &str {
                self.0.description()
            }
            fn priority(&self) -> u32 {
                self.0.priority()
            }
            fn applies_to(&self) -> &ToolSelector {
                self.0.applies_to()
            }
            fn evaluate(&self, request: &PolicyRequest) -> WardenResult<Option<RuleVerdict>> {
                self.0.evaluate(request)
            }
        }

        let engine = PolicyEngine::new(
            vec![
                Box::new(ScriptedRule::new("denier", 10, Script::Deny)),
                Box::new(Shared(late.clone())),
            ],
            Arc::new(RecordingStore::default()),
        );

        engine.evaluate(&exec_request());
        assert_eq!(late.call_count(), 0, "no rule ordered after a deny may run");
    }

    // ── 3. Quarantine escalation ─────────────────────────────────────────────

    #[test]
    fn quarantine_does_not_short_circuit() {
        let engine = PolicyEngine::new(
            vec![
                Box::new(ScriptedRule::new("flagger", 10, Script::Quarantine)),
                Box::new(ScriptedRule::new("after", 20, Script::NoOpinion)),
            ],
            Arc::new(RecordingStore::default()),
        );

        let decision = engine.evaluate(&exec_request());

        assert_eq!(decision.action, PolicyAction::Quarantine);
        assert_eq!(decision.reason_code, "TEST_QUARANTINE");
        // Evaluation continued past the quarantine.
        assert_eq!(decision.rules_evaluated, vec!["flagger", "after"]);
    }

    #[test]
    fn later_deny_escalates_a_quarantine() {
        let engine = PolicyEngine::new(
            vec![
                Box::new(ScriptedRule::new("flagger", 10, Script::Quarantine)),
                Box::new(ScriptedRule::new("denier", 20, Script::Deny)),
            ],
            Arc::new(RecordingStore::default()),
        );

        let decision = engine.evaluate(&exec_request());

        assert_eq!(decision.action, PolicyAction::Deny);
        assert_eq!(decision.reason_code, "TEST_DENY");
        assert_eq!(decision.rules_triggered, vec!["flagger", "denier"]);
    }

    #[test]
    fn first_quarantine_reason_survives_later_quarantines() {
        let engine = PolicyEngine::new(
            vec![
                Box::new(ScriptedRule::new("first", 10, Script::Quarantine)),
                Box::new(ScriptedRule::new("second", 20, Script::Quarantine)),
            ],
            Arc::new(RecordingStore::default()),
        );

        let decision = engine.evaluate(&exec_request());

        assert_eq!(decision.action, PolicyAction::Quarantine);
        assert_eq!(decision.rules_triggered, vec!["first", "second"]);
        // The first flagger's verdict is the one reported.
        assert!(decision.message.contains("flagged"));
    }

    // ── 4. Selector filtering ────────────────────────────────────────────────

    #[test]
    fn rules_outside_their_selector_never_run() {
        let engine = PolicyEngine::new(
            vec![Box::new(
                ScriptedRule::new("financial_only", 10, Script::Deny)
                    .with_selector(ToolSelector::categories([ToolCategory::Financial])),
            )],
            Arc::new(RecordingStore::default()),
        );

        let decision = engine.evaluate(&exec_request());

        assert_eq!(decision.action, PolicyAction::Allow);
        assert!(decision.rules_evaluated.is_empty());
    }

    // ── 5. Rule faults ───────────────────────────────────────────────────────

    #[test]
    fn faulting_rule_is_no_opinion_and_counted() {
        let engine = PolicyEngine::new(
            vec![
                Box::new(ScriptedRule::new("broken", 10, Script::Fault)),
                Box::new(ScriptedRule::new("after", 20, Script::Quarantine)),
            ],
            Arc::new(RecordingStore::default()),
        );

        let decision = engine.evaluate(&exec_request());

        // The fault neither denied nor allowed on its own; the pipeline
        // continued and the later rule still fired.
        assert_eq!(decision.action, PolicyAction::Quarantine);
        assert_eq!(decision.rules_evaluated, vec!["broken", "after"]);
        assert_eq!(decision.rules_triggered, vec!["after"]);
        assert_eq!(engine.rule_fault_count(), 1);
    }

    // ── 6. Invariants ────────────────────────────────────────────────────────

    #[test]
    fn triggered_is_subset_of_evaluated() {
        let engine = PolicyEngine::new(
            vec![
                Box::new(ScriptedRule::new("a", 10, Script::NoOpinion)),
                Box::new(ScriptedRule::new("b", 20, Script::Quarantine)),
                Box::new(ScriptedRule::new("c", 30, Script::Deny)),
            ],
            Arc::new(RecordingStore::default()),
        );

        let decision = engine.evaluate(&exec_request());

        for triggered in &decision.rules_triggered {
            assert!(
                decision.rules_evaluated.contains(triggered),
                "triggered rule {} missing from evaluated list",
                triggered
            );
        }
    }

    #[test]
    fn evaluation_is_idempotent_for_stateless_rules() {
        let engine = PolicyEngine::new(
            vec![Box::new(ScriptedRule::new("denier", 10, Script::Deny))],
            Arc::new(RecordingStore::default()),
        );

        let request = exec_request();
        let first = engine.evaluate(&request);
        let second = engine.evaluate(&request);

        assert_eq!(first.action, second.action);
        assert_eq!(first.reason_code, second.reason_code);
        assert_eq!(first.args_hash, second.args_hash);
        assert_eq!(first.rules_evaluated, second.rules_evaluated);
    }

    #[test]
    fn priority_sort_is_stable_for_ties() {
        let engine = PolicyEngine::new(
            vec![
                Box::new(ScriptedRule::new("registered_first", 10, Script::NoOpinion)),
                Box::new(ScriptedRule::new("registered_second", 10, Script::NoOpinion)),
            ],
            Arc::new(RecordingStore::default()),
        );

        let decision = engine.evaluate(&exec_request());
        assert_eq!(decision.rules_evaluated, vec!["registered_first", "registered_second"]);
    }

    // ── 7. Authority derivation ──────────────────────────────────────────────

    #[test]
    fn authority_mapping_is_total() {
        assert_eq!(derive_authority_level(None), AuthorityLevel::External);
        assert_eq!(
            derive_authority_level(Some(InputSource::Heartbeat)),
            AuthorityLevel::External
        );
        assert_eq!(derive_authority_level(Some(InputSource::Creator)), AuthorityLevel::Agent);
        assert_eq!(derive_authority_level(Some(InputSource::Agent)), AuthorityLevel::Agent);
        assert_eq!(derive_authority_level(Some(InputSource::System)), AuthorityLevel::System);
        assert_eq!(derive_authority_level(Some(InputSource::Wakeup)), AuthorityLevel::System);
    }

    // ── 8. Argument hashing ──────────────────────────────────────────────────

    #[test]
    fn args_hash_ignores_key_order() {
        let a = json!({ "to_address": "0xabc", "amount_cents": 100 });
        let b = json!({ "amount_cents": 100, "to_address": "0xabc" });

        assert_eq!(hash_args(&a), hash_args(&b));
    }

    #[test]
    fn args_hash_differs_for_different_args() {
        let a = json!({ "amount_cents": 100 });
        let b = json!({ "amount_cents": 101 });

        assert_ne!(hash_args(&a), hash_args(&b));
    }

    // ── 9. Decision logging ──────────────────────────────────────────────────

    #[test]
    fn log_decision_persists_a_row() {
        let store = Arc::new(RecordingStore::default());
        let engine = PolicyEngine::new(
            vec![Box::new(ScriptedRule::new("denier", 10, Script::Deny))],
            store.clone(),
        );

        let decision = engine.evaluate(&exec_request());
        engine.log_decision(&decision, Some("turn-7"));

        let rows = store.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.turn_id.as_deref(), Some("turn-7"));
        assert_eq!(row.tool_name, "exec");
        assert_eq!(row.decision, PolicyAction::Deny);
        assert_eq!(row.reason, "TEST_DENY: denied by test");
        assert_eq!(row.rules_evaluated, decision.rules_evaluated);
        assert_eq!(row.rules_triggered, decision.rules_triggered);
    }

    #[test]
    fn log_failures_are_swallowed_but_counted() {
        let engine = PolicyEngine::new(
            vec![Box::new(ScriptedRule::new("a", 10, Script::NoOpinion))],
            Arc::new(BrokenStore),
        );

        let decision = engine.evaluate(&exec_request());

        // Must not panic or propagate the store failure.
        engine.log_decision(&decision, None);
        engine.log_decision(&decision, None);

        assert_eq!(engine.log_failure_count(), 2);
    }
}
