//! Authority policy rules.
//!
//! The first line of defense against injected instructions masquerading as
//! agent intent: turns that originate from an untrusted source (inbound
//! message, heartbeat, unknown) must not reach dangerous or self-mutating
//! tools, no matter what the arguments say.

use warden_contracts::{
    error::WardenResult,
    policy::{AuthorityLevel, RuleVerdict},
    request::PolicyRequest,
    tool::{RiskLevel, ToolCategory, ToolSelector},
};
use warden_core::{derive_authority_level, traits::PolicyRule};

const PRIORITY: u32 = 50;

/// Tools registered as `forbidden` are never executed, regardless of who
/// asks. Registration-time classification, not authority, decides this.
struct ForbiddenToolRule {
    selector: ToolSelector,
}

impl ForbiddenToolRule {
    fn new() -> Self {
        Self {
            selector: ToolSelector::risks([RiskLevel::Forbidden]),
        }
    }
}

impl PolicyRule for ForbiddenToolRule {
    fn id(&self) -> &str {
        "authority.forbidden_tool"
    }

    fn description(&self) -> &str {
        "Tools registered at the forbidden risk level are never executed"
    }

    fn priority(&self) -> u32 {
        PRIORITY
    }

    fn applies_to(&self) -> &ToolSelector {
        &self.selector
    }

    fn evaluate(&self, request: &PolicyRequest) -> WardenResult<Option<RuleVerdict>> {
        Ok(Some(RuleVerdict::deny(
            self.id(),
            "FORBIDDEN_TOOL",
            format!(
                "Tool '{}' is registered as forbidden and can never be executed.",
                request.tool.name
            ),
        )))
    }
}

/// Denies a class of tools when the turn's authority level is `External`.
struct ExternalAuthorityRule {
    id: &'static str,
    description: &'static str,
    selector: ToolSelector,
    blocked: &'static str,
}

impl PolicyRule for ExternalAuthorityRule {
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
        if derive_authority_level(request.turn.input_source) != AuthorityLevel::External {
            return Ok(None);
        }

        Ok(Some(RuleVerdict::deny(
            self.id,
            "AUTHORITY_DENIED",
            format!(
                "Tool '{}' cannot be used from an externally-originated turn: {}. \
                 Wait for the agent's own reasoning or the system to request this.",
                request.tool.name, self.blocked
            ),
        )))
    }
}

/// Create all authority rules.
pub fn create_authority_rules() -> Vec<Box<dyn PolicyRule>> {
    vec![
        Box::new(ForbiddenToolRule::new()),
        Box::new(ExternalAuthorityRule {
            id: "authority.external_dangerous",
            description: "External turns may not invoke dangerous tools",
            selector: ToolSelector::risks([RiskLevel::Dangerous]),
            blocked: "dangerous tools require agent or system authority",
        }),
        Box::new(ExternalAuthorityRule {
            id: "authority.external_file_mutation",
            description: "External turns may not mutate files",
            selector: ToolSelector::names(["write_file", "edit_own_file"]),
            blocked: "file mutation requires agent or system authority",
        }),
        Box::new(ExternalAuthorityRule {
            id: "authority.external_financial",
            description: "External turns may not move money",
            selector: ToolSelector::categories([ToolCategory::Financial]),
            blocked: "financial tools require agent or system authority",
        }),
    ]
}
