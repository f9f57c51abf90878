//! Input validation policy rules.
//!
//! Structural checks on tool arguments — types, required fields, length
//! bounds — run before any side-effecting rule, so malformed input never
//! reaches a shell command, a store query, or a network call.

use regex::Regex;

use warden_contracts::{
    error::WardenResult,
    policy::RuleVerdict,
    request::PolicyRequest,
    tool::ToolSelector,
};
use warden_core::traits::PolicyRule;

const PRIORITY: u32 = 200;

/// Outbound message size bound, in bytes.
const MAX_MESSAGE_CONTENT_BYTES: usize = 64_000;

/// Validates one string field against a pattern.
///
/// Absent fields are no opinion — required-field enforcement is a separate
/// concern (see `RequiredAmountRule`); this rule only rejects values that
/// are present but malformed.
struct FieldPatternRule {
    id: &'static str,
    description: &'static str,
    selector: ToolSelector,
    field: &'static str,
    /// Fallback key checked when `field` is absent.
    alt_field: Option<&'static str>,
    pattern: Regex,
    requirement: &'static str,
}

impl FieldPatternRule {
    #[allow(clippy::too_many_arguments)]
    fn boxed(
        id: &'static str,
        description: &'static str,
        tools: &[&str],
        field: &'static str,
        alt_field: Option<&'static str>,
        pattern: &str,
        requirement: &'static str,
    ) -> Box<dyn PolicyRule> {
        Box::new(Self {
            id,
            description,
            selector: ToolSelector::names(tools.iter().copied()),
            field,
            alt_field,
            pattern: Regex::new(pattern).expect("static validation pattern must compile"),
            requirement,
        })
    }
}

impl PolicyRule for FieldPatternRule {
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
        let value = request
            .str_arg(self.field)
            .or_else(|| self.alt_field.and_then(|f| request.str_arg(f)));
        let Some(value) = value else {
            return Ok(None);
        };

        if !self.pattern.is_match(value) {
            return Ok(Some(RuleVerdict::deny(
                self.id,
                "VALIDATION_FAILED",
                format!("Invalid {}: \"{}\". {}", self.field, value, self.requirement),
            )));
        }

        Ok(None)
    }
}

/// Validates port numbers: present means integral and in range.
struct PortRangeRule {
    selector: ToolSelector,
}

impl PolicyRule for PortRangeRule {
    fn id(&self) -> &str {
        "validate.port_range"
    }

    fn description(&self) -> &str {
        "Port numbers must be integers in 1-65535"
    }

    fn priority(&self) -> u32 {
        PRIORITY
    }

    fn applies_to(&self) -> &ToolSelector {
        &self.selector
    }

    fn evaluate(&self, request: &PolicyRequest) -> WardenResult<Option<RuleVerdict>> {
        let Some(value) = request.args.get("port") else {
            return Ok(None);
        };

        match value.as_u64() {
            Some(port) if (1..=65_535).contains(&port) => Ok(None),
            _ => Ok(Some(RuleVerdict::deny(
                self.id(),
                "VALIDATION_FAILED",
                format!("Invalid port: {}. Must be an integer 1-65535.", value),
            ))),
        }
    }
}

/// Validates amounts on financial tools.
///
/// `transfer_credits` and `fund_child` require a positive integral
/// `amount_cents`; `x402_fetch` may omit it (a free fetch) but a present
/// value must still be well-formed.
struct RequiredAmountRule {
    selector: ToolSelector,
}

impl RequiredAmountRule {
    fn amount_required(tool: &str) -> bool {
        matches!(tool, "transfer_credits" | "fund_child")
    }
}

impl PolicyRule for RequiredAmountRule {
    fn id(&self) -> &str {
        "validate.amount"
    }

    fn description(&self) -> &str {
        "Financial amounts must be positive integers of cents"
    }

    fn priority(&self) -> u32 {
        PRIORITY
    }

    fn applies_to(&self) -> &ToolSelector {
        &self.selector
    }

    fn evaluate(&self, request: &PolicyRequest) -> WardenResult<Option<RuleVerdict>> {
        match request.args.get("amount_cents") {
            None => {
                if Self::amount_required(&request.tool.name) {
                    Ok(Some(RuleVerdict::deny(
                        self.id(),
                        "VALIDATION_FAILED",
                        format!("Tool '{}' requires amount_cents.", request.tool.name),
                    )))
                } else {
                    Ok(None)
                }
            }
            Some(value) => match value.as_u64() {
                Some(amount) if amount > 0 => Ok(None),
                _ => Ok(Some(RuleVerdict::deny(
                    self.id(),
                    "VALIDATION_FAILED",
                    format!(
                        "Invalid amount_cents: {}. Must be a positive integer of cents.",
                        value
                    ),
                ))),
            },
        }
    }
}

/// Bounds the size of outbound message content.
struct MessageLengthRule {
    selector: ToolSelector,
}

impl PolicyRule for MessageLengthRule {
    fn id(&self) -> &str {
        "validate.message_length"
    }

    fn description(&self) -> &str {
        "Outbound message content is length-bounded"
    }

    fn priority(&self) -> u32 {
        PRIORITY
    }

    fn applies_to(&self) -> &ToolSelector {
        &self.selector
    }

    fn evaluate(&self, request: &PolicyRequest) -> WardenResult<Option<RuleVerdict>> {
        let Some(content) = request.str_arg("content") else {
            return Ok(None);
        };

        if content.len() > MAX_MESSAGE_CONTENT_BYTES {
            return Ok(Some(RuleVerdict::deny(
                self.id(),
                "VALIDATION_FAILED",
                format!(
                    "Message content is {} bytes; the maximum is {}.",
                    content.len(),
                    MAX_MESSAGE_CONTENT_BYTES
                ),
            )));
        }

        Ok(None)
    }
}

/// Create all validation rules.
pub fn create_validation_rules() -> Vec<Box<dyn PolicyRule>> {
    vec![
        FieldPatternRule::boxed(
            "validate.package_name",
            "Package names are restricted to registry-safe characters",
            &["install_package"],
            "package",
            None,
            r"^[@A-Za-z0-9._/-]+$",
            "Package names may only contain alphanumerics, '@', '.', '_', '/' and '-'.",
        ),
        FieldPatternRule::boxed(
            "validate.skill_name",
            "Skill names are alphanumeric plus hyphens",
            &["install_skill", "create_skill", "remove_skill"],
            "name",
            None,
            r"^[A-Za-z0-9-]+$",
            "Skill names may only contain alphanumerics and hyphens.",
        ),
        FieldPatternRule::boxed(
            "validate.git_hash",
            "Commit references are lowercase hex",
            &["pull_upstream"],
            "commit",
            None,
            r"^[a-f0-9]{7,40}$",
            "Commit hashes are 7-40 lowercase hex characters.",
        ),
        FieldPatternRule::boxed(
            "validate.address_format",
            "Recipient addresses are 0x-prefixed 40-hex strings",
            &["transfer_credits", "send_message", "fund_child"],
            "to_address",
            Some("agent_address"),
            r"^0x[a-fA-F0-9]{40}$",
            "Addresses are 0x followed by 40 hex characters.",
        ),
        FieldPatternRule::boxed(
            "validate.cron_expression",
            "Schedules are five space-separated cron fields",
            &["modify_heartbeat"],
            "schedule",
            None,
            r"^(\*|[\d,*/-]+)\s+(\*|[\d,*/-]+)\s+(\*|[\d,*/-]+)\s+(\*|[\d,*/-]+)\s+(\*|[\d,*/-]+)$",
            "Schedules must be 5 space-separated cron fields.",
        ),
        Box::new(PortRangeRule {
            selector: ToolSelector::names(["expose_port", "remove_port"]),
        }),
        Box::new(RequiredAmountRule {
            selector: ToolSelector::names(["transfer_credits", "fund_child", "x402_fetch"]),
        }),
        Box::new(MessageLengthRule {
            selector: ToolSelector::names(["send_message"]),
        }),
    ]
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use warden_contracts::{
        request::TurnContext,
        tool::{RiskLevel, ToolCategory, ToolDescriptor},
    };

    use super::*;

    fn request(tool: &str, args: Value) -> PolicyRequest {
        PolicyRequest::new(
            ToolDescriptor::new(tool, ToolCategory::Vm, RiskLevel::Caution),
            args,
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
    fn package_names_are_validated() {
        let rules = create_validation_rules();
        let rule = find(&rules, "validate.package_name");

        assert!(rule
            .evaluate(&request("install_package", json!({ "package": "@scope/tool-1.2" })))
            .unwrap()
            .is_none());

        let verdict = rule
            .evaluate(&request("install_package", json!({ "package": "evil; rm -rf /" })))
            .unwrap()
            .unwrap();
        assert_eq!(verdict.reason_code, "VALIDATION_FAILED");
    }

    #[test]
    fn addresses_are_validated_on_either_field() {
        let rules = create_validation_rules();
        let rule = find(&rules, "validate.address_format");
        let good = "0x1234567890abcdef1234567890ABCDEF12345678";

        assert!(rule
            .evaluate(&request("transfer_credits", json!({ "to_address": good })))
            .unwrap()
            .is_none());
        assert!(rule
            .evaluate(&request("fund_child", json!({ "agent_address": good })))
            .unwrap()
            .is_none());

        let verdict = rule
            .evaluate(&request("transfer_credits", json!({ "to_address": "0x123" })))
            .unwrap()
            .unwrap();
        assert!(verdict.message.contains("40 hex"));
    }

    #[test]
    fn cron_expressions_are_validated() {
        let rules = create_validation_rules();
        let rule = find(&rules, "validate.cron_expression");

        assert!(rule
            .evaluate(&request("modify_heartbeat", json!({ "schedule": "*/5 * * * *" })))
            .unwrap()
            .is_none());

        let verdict = rule
            .evaluate(&request("modify_heartbeat", json!({ "schedule": "every five minutes" })))
            .unwrap()
            .unwrap();
        assert_eq!(verdict.reason_code, "VALIDATION_FAILED");
    }

    #[test]
    fn ports_must_be_integral_and_in_range() {
        let rules = create_validation_rules();
        let rule = find(&rules, "validate.port_range");

        assert!(rule
            .evaluate(&request("expose_port", json!({ "port": 8080 })))
            .unwrap()
            .is_none());

        for bad in [json!({ "port": 0 }), json!({ "port": 70_000 }), json!({ "port": "8080" })] {
            let verdict = rule.evaluate(&request("expose_port", bad)).unwrap().unwrap();
            assert_eq!(verdict.reason_code, "VALIDATION_FAILED");
        }
    }

    #[test]
    fn transfer_amounts_are_required_and_positive() {
        let rules = create_validation_rules();
        let rule = find(&rules, "validate.amount");

        assert!(rule
            .evaluate(&request("transfer_credits", json!({ "amount_cents": 500 })))
            .unwrap()
            .is_none());

        // Missing on a transfer: denied.
        let verdict = rule.evaluate(&request("transfer_credits", json!({}))).unwrap().unwrap();
        assert!(verdict.message.contains("requires amount_cents"));

        // Missing on an x402 fetch: fine (a free fetch).
        assert!(rule.evaluate(&request("x402_fetch", json!({}))).unwrap().is_none());

        // Present but malformed: denied everywhere.
        for bad in [json!({ "amount_cents": 0 }), json!({ "amount_cents": -5 }),
                    json!({ "amount_cents": "100" })] {
            let verdict = rule.evaluate(&request("x402_fetch", bad)).unwrap().unwrap();
            assert_eq!(verdict.reason_code, "VALIDATION_FAILED");
        }
    }

    #[test]
    fn oversized_messages_are_denied() {
        let rules = create_validation_rules();
        let rule = find(&rules, "validate.message_length");

        let verdict = rule
            .evaluate(&request("send_message", json!({ "content": "x".repeat(64_001) })))
            .unwrap()
            .unwrap();
        assert_eq!(verdict.reason_code, "VALIDATION_FAILED");

        assert!(rule
            .evaluate(&request("send_message", json!({ "content": "hello" })))
            .unwrap()
            .is_none());
    }
}
