//! Rate limit policy rules.
//!
//! Counts allowed decisions for an operation within a trailing window and
//! denies once a configured ceiling is exceeded. Because the count comes
//! from the persisted decision log, these ceilings hold across turns, not
//! just within one.

use std::sync::Arc;

use chrono::{Duration, Utc};

use warden_contracts::{
    error::WardenResult,
    policy::RuleVerdict,
    request::PolicyRequest,
    tool::ToolSelector,
};
use warden_core::traits::{DecisionStore, PolicyRule};

const PRIORITY: u32 = 300;

/// Denies a tool once it has been allowed `ceiling` times within the
/// trailing window.
pub struct RateLimitRule {
    id: &'static str,
    description: &'static str,
    selector: ToolSelector,
    window: Duration,
    window_label: &'static str,
    ceiling: u64,
    store: Arc<dyn DecisionStore>,
}

impl PolicyRule for RateLimitRule {
    fn id(&self) -> &str {
        self.id
    }

    fn description(&self) -> &str {
        self.description
    }

    fn priority(&self) -> u32 {
        PRIORITY
    }

    fn applies_to(&self) -> &ToolSelector {
        &self.selector
    }

    fn evaluate(&self, request: &PolicyRequest) -> WardenResult<Option<RuleVerdict>> {
        let since = Utc::now() - self.window;
        let count = self.store.count_allowed_since(&request.tool.name, since)?;

        if count >= self.ceiling {
            return Ok(Some(RuleVerdict::deny(
                self.id,
                "RATE_LIMITED",
                format!(
                    "'{}' was already allowed {} times in the last {}; the ceiling is {}. \
                     Wait for the window to pass.",
                    request.tool.name, count, self.window_label, self.ceiling
                ),
            )));
        }

        Ok(None)
    }
}

/// Create all rate-limit rules against the given decision log.
pub fn create_rate_limit_rules(store: Arc<dyn DecisionStore>) -> Vec<Box<dyn PolicyRule>> {
    vec![
        Box::new(RateLimitRule {
            id: "rate.send_message",
            description: "Outbound messages are capped per hour",
            selector: ToolSelector::names(["send_message"]),
            window: Duration::hours(1),
            window_label: "hour",
            ceiling: 100,
            store: store.clone(),
        }),
        Box::new(RateLimitRule {
            id: "rate.spawn_child",
            description: "Child spawns are capped per day",
            selector: ToolSelector::names(["spawn_child"]),
            window: Duration::days(1),
            window_label: "day",
            ceiling: 3,
            store: store.clone(),
        }),
        Box::new(RateLimitRule {
            id: "rate.register_domain",
            description: "Domain registrations are capped per day",
            selector: ToolSelector::names(["register_domain"]),
            window: Duration::days(1),
            window_label: "day",
            ceiling: 3,
            store,
        }),
    ]
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::DateTime;
    use serde_json::json;

    use warden_contracts::{
        error::WardenError,
        log::DecisionRow,
        policy::PolicyAction,
        request::TurnContext,
        tool::{RiskLevel, ToolCategory, ToolDescriptor},
    };

    use super::*;

    /// A store that serves a fixed per-tool count.
    struct FixedCountStore {
        counts: Mutex<Vec<(String, u64)>>,
    }

    impl FixedCountStore {
        fn new(counts: &[(&str, u64)]) -> Arc<Self> {
            Arc::new(Self {
                counts: Mutex::new(
                    counts.iter().map(|(t, c)| (t.to_string(), *c)).collect(),
                ),
            })
        }
    }

    impl DecisionStore for FixedCountStore {
        fn insert(&self, _row: &DecisionRow) -> WardenResult<()> {
            Ok(())
        }

        fn count_allowed_since(
            &self,
            tool_name: &str,
            _since: DateTime<Utc>,
        ) -> WardenResult<u64> {
            Ok(self
                .counts
                .lock()
                .unwrap()
                .iter()
                .find(|(t, _)| t == tool_name)
                .map(|(_, c)| *c)
                .unwrap_or(0))
        }

        fn last_allowed_at(&self, _tool_names: &[&str]) -> WardenResult<Option<DateTime<Utc>>> {
            Ok(None)
        }
    }

    /// A store whose queries always fail.
    struct OfflineStore;

    impl DecisionStore for OfflineStore {
        fn insert(&self, _row: &DecisionRow) -> WardenResult<()> {
            Ok(())
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

    fn request(tool: &str) -> PolicyRequest {
        PolicyRequest::new(
            ToolDescriptor::new(tool, ToolCategory::Replication, RiskLevel::Dangerous),
            json!({}),
            TurnContext::default(),
        )
    }

    fn find<'a>(rules: &'a [Box<dyn PolicyRule>], id: &str) -> &'a dyn PolicyRule {
        rules
            .iter()
            .find(|r| r.id() == id)
            .unwrap_or_else(|| panic!("rule '{}' not found", id))
            .as_ref()
    }

    #[test]
    fn below_the_ceiling_is_no_opinion() {
        let store = FixedCountStore::new(&[("spawn_child", 2)]);
        let rules = create_rate_limit_rules(store);
        let rule = find(&rules, "rate.spawn_child");

        assert!(rule.evaluate(&request("spawn_child")).unwrap().is_none());
    }

    #[test]
    fn at_the_ceiling_is_denied_with_figures() {
        let store = FixedCountStore::new(&[("spawn_child", 3)]);
        let rules = create_rate_limit_rules(store);
        let rule = find(&rules, "rate.spawn_child");

        let verdict = rule.evaluate(&request("spawn_child")).unwrap().unwrap();
        assert_eq!(verdict.action, PolicyAction::Deny);
        assert_eq!(verdict.reason_code, "RATE_LIMITED");
        assert!(verdict.message.contains("3 times"), "got: {}", verdict.message);
    }

    #[test]
    fn store_faults_surface_as_errors_for_the_engine_to_absorb() {
        let rules = create_rate_limit_rules(Arc::new(OfflineStore));
        let rule = find(&rules, "rate.send_message");

        let result = rule.evaluate(&request("send_message"));
        assert!(matches!(result, Err(WardenError::StoreQuery { .. })));
    }
}
