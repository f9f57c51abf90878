//! File path protection policy rules.
//!
//! Prevents writes to protected files, reads of sensitive files, and path
//! traversal. This family is the single home of path logic for *every*
//! file-mutating tool — `write_file` and `edit_own_file` go through the
//! same rules, so the two mutation paths cannot drift apart.

use warden_contracts::{
    error::WardenResult,
    policy::RuleVerdict,
    request::PolicyRequest,
    tool::ToolSelector,
};
use warden_core::traits::PolicyRule;

const PRIORITY: u32 = 100;

/// Files the agent must never overwrite: its constitution, identity,
/// wallet, and the state database behind all of them.
const PROTECTED_WRITE_FILES: &[&str] =
    &["constitution.md", "identity.json", "wallet.json", "agent.db", "treasury.toml"];

/// Files whose contents must never flow into a tool result.
const SENSITIVE_READ_FILES: &[&str] = &["wallet.json", ".env"];

/// The final path component, with either separator style.
fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// True if any path component is `..`, or the path smuggles a traversal
/// through percent-encoding or an embedded NUL.
fn has_traversal(path: &str) -> bool {
    if path.contains('\0') {
        return true;
    }
    let lowered = path.to_ascii_lowercase();
    if lowered.contains("%2e%2e") {
        return true;
    }
    path.split(['/', '\\']).any(|component| component == "..")
}

/// Denies writes that target a protected file.
struct ProtectedWriteRule {
    selector: ToolSelector,
}

impl PolicyRule for ProtectedWriteRule {
    fn id(&self) -> &str {
        "path.protected_write"
    }

    fn description(&self) -> &str {
        "Writes to constitution, identity, wallet, and state files are denied"
    }

    fn priority(&self) -> u32 {
        PRIORITY
    }

    fn applies_to(&self) -> &ToolSelector {
        &self.selector
    }

    fn evaluate(&self, request: &PolicyRequest) -> WardenResult<Option<RuleVerdict>> {
        let Some(path) = request.str_arg("path") else {
            return Ok(None);
        };

        if PROTECTED_WRITE_FILES.contains(&basename(path)) {
            return Ok(Some(RuleVerdict::deny(
                self.id(),
                "PROTECTED_PATH",
                format!(
                    "Writing to '{}' is not permitted: it is a protected identity/state file.",
                    path
                ),
            )));
        }

        Ok(None)
    }
}

/// Denies reads of files that hold key material.
struct SensitiveReadRule {
    selector: ToolSelector,
}

impl PolicyRule for SensitiveReadRule {
    fn id(&self) -> &str {
        "path.sensitive_read"
    }

    fn description(&self) -> &str {
        "Reads of wallet and environment files are denied"
    }

    fn priority(&self) -> u32 {
        PRIORITY
    }

    fn applies_to(&self) -> &ToolSelector {
        &self.selector
    }

    fn evaluate(&self, request: &PolicyRequest) -> WardenResult<Option<RuleVerdict>> {
        let Some(path) = request.str_arg("path") else {
            return Ok(None);
        };

        if SENSITIVE_READ_FILES.contains(&basename(path)) {
            return Ok(Some(RuleVerdict::deny(
                self.id(),
                "SENSITIVE_PATH",
                format!(
                    "Reading '{}' is not permitted: it holds key material that must not \
                     enter a tool result.",
                    path
                ),
            )));
        }

        Ok(None)
    }
}

/// Denies any path containing a traversal sequence.
struct PathTraversalRule {
    selector: ToolSelector,
}

impl PolicyRule for PathTraversalRule {
    fn id(&self) -> &str {
        "path.traversal"
    }

    fn description(&self) -> &str {
        "Path arguments containing traversal sequences are denied"
    }

    fn priority(&self) -> u32 {
        PRIORITY
    }

    fn applies_to(&self) -> &ToolSelector {
        &self.selector
    }

    fn evaluate(&self, request: &PolicyRequest) -> WardenResult<Option<RuleVerdict>> {
        let Some(path) = request.str_arg("path") else {
            return Ok(None);
        };

        if has_traversal(path) {
            return Ok(Some(RuleVerdict::deny(
                self.id(),
                "PATH_TRAVERSAL",
                format!("Path '{}' contains a traversal sequence.", path),
            )));
        }

        Ok(None)
    }
}

/// Create all path-protection rules.
pub fn create_path_protection_rules() -> Vec<Box<dyn PolicyRule>> {
    vec![
        Box::new(ProtectedWriteRule {
            selector: ToolSelector::names(["write_file", "edit_own_file"]),
        }),
        Box::new(SensitiveReadRule {
            selector: ToolSelector::names(["read_file"]),
        }),
        Box::new(PathTraversalRule {
            selector: ToolSelector::names(["write_file", "edit_own_file", "read_file"]),
        }),
    ]
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use warden_contracts::{
        policy::PolicyAction,
        request::TurnContext,
        tool::{RiskLevel, ToolCategory, ToolDescriptor},
    };

    use super::*;

    fn write_request(path: &str, tool: &str) -> PolicyRequest {
        PolicyRequest::new(
            ToolDescriptor::new(tool, ToolCategory::Vm, RiskLevel::Caution),
            json!({ "path": path, "content": "x" }),
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
    fn protected_files_cannot_be_written_via_either_tool() {
        let rules = create_path_protection_rules();
        let rule = find(&rules, "path.protected_write");

        // Both mutation paths hit the same rule.
        for tool in ["write_file", "edit_own_file"] {
            let verdict = rule
                .evaluate(&write_request("/agent/constitution.md", tool))
                .unwrap()
                .unwrap();
            assert_eq!(verdict.action, PolicyAction::Deny);
            assert_eq!(verdict.reason_code, "PROTECTED_PATH");
        }

        assert!(rule
            .evaluate(&write_request("/agent/notes.md", "write_file"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn sensitive_files_cannot_be_read() {
        let rules = create_path_protection_rules();
        let rule = find(&rules, "path.sensitive_read");

        let verdict = rule
            .evaluate(&write_request("/agent/wallet.json", "read_file"))
            .unwrap()
            .unwrap();
        assert_eq!(verdict.reason_code, "SENSITIVE_PATH");

        assert!(rule
            .evaluate(&write_request("/agent/readme.md", "read_file"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn traversal_sequences_are_denied() {
        let rules = create_path_protection_rules();
        let rule = find(&rules, "path.traversal");

        for path in [
            "../../etc/passwd",
            "/agent/../wallet.json",
            "notes/%2E%2E/secret",
            "file\0.md",
        ] {
            let verdict = rule.evaluate(&write_request(path, "read_file")).unwrap().unwrap();
            assert_eq!(verdict.reason_code, "PATH_TRAVERSAL", "path: {path}");
        }

        // Dots inside a component are not traversal.
        assert!(rule
            .evaluate(&write_request("/agent/archive..2026/notes.md", "read_file"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn missing_path_argument_is_no_opinion() {
        let rules = create_path_protection_rules();
        let request = PolicyRequest::new(
            ToolDescriptor::new("write_file", ToolCategory::Vm, RiskLevel::Caution),
            json!({}),
            TurnContext::default(),
        );

        for rule in &rules {
            assert!(rule.evaluate(&request).unwrap().is_none());
        }
    }
}
