//! Entropy guard: secret-exfiltration detection.
//!
//! A prompt-injected instruction can trick the agent into transmitting its
//! own private key, seed phrase, or another encoded secret to an external
//! endpoint. This guard flattens every string field out of the tool
//! arguments and tests three independent signatures; any single positive
//! match is sufficient cause to refuse the call outright.

use regex::Regex;
use tracing::warn;

use warden_contracts::{
    error::WardenResult,
    policy::RuleVerdict,
    request::PolicyRequest,
    tool::ToolSelector,
};
use warden_core::traits::PolicyRule;

use super::GUARD_PRIORITY;

/// Strings shorter than this cannot hold enough data for a secret.
const MIN_SECRET_LEN: usize = 20;

/// Shannon entropy (bits/char) above which a base64-shaped run is treated
/// as a secret. The measurement exists to avoid false positives on
/// ordinary long base64-looking text that is not actually random.
const ENTROPY_THRESHOLD: f64 = 5.0;

/// Shannon entropy of a string, in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq = std::collections::HashMap::new();
    let mut len = 0usize;
    for c in s.chars() {
        *freq.entry(c).or_insert(0usize) += 1;
        len += 1;
    }

    let len = len as f64;
    freq.values().fold(0.0, |entropy, count| {
        let p = *count as f64 / len;
        entropy - p * p.log2()
    })
}

/// Recursively collect every string field from `value` under dotted key
/// paths. Arrays are not descended.
fn string_fields(value: &serde_json::Value, prefix: &str, out: &mut Vec<(String, String)>) {
    let Some(object) = value.as_object() else {
        return;
    };

    for (key, v) in object {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match v {
            serde_json::Value::String(s) => out.push((path, s.clone())),
            serde_json::Value::Object(_) => string_fields(v, &path, out),
            _ => {}
        }
    }
}

/// Blocks payloads containing private keys, mnemonics, or high-entropy
/// secrets.
pub struct EntropyGuardRule {
    selector: ToolSelector,
    raw_key: Regex,
    mnemonic: Regex,
    base64_run: Regex,
}

impl EntropyGuardRule {
    pub fn new() -> Self {
        Self {
            selector: ToolSelector::names([
                "exec",
                "x402_fetch",
                "transfer_credits",
                "send_message",
                "write_file",
                "fund_child",
            ]),
            // Raw 256-bit private key, 0x-prefixed.
            raw_key: Regex::new(r"0x[0-9a-fA-F]{64}")
                .expect("static entropy pattern must compile"),
            // Twelve or more consecutive lowercase words of 3-8 letters.
            mnemonic: Regex::new(r"\b([a-z]{3,8}\s+){11,}[a-z]{3,8}\b")
                .expect("static entropy pattern must compile"),
            // Base64-shaped run long enough to encode key material.
            base64_run: Regex::new(r"[A-Za-z0-9+/]{40,}={0,2}")
                .expect("static entropy pattern must compile"),
        }
    }
}

impl Default for EntropyGuardRule {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyRule for EntropyGuardRule {
    fn id(&self) -> &str {
        "guard.entropy"
    }

    fn description(&self) -> &str {
        "Block payloads containing private keys, mnemonics, or high-entropy secrets"
    }

    fn priority(&self) -> u32 {
        GUARD_PRIORITY
    }

    fn applies_to(&self) -> &ToolSelector {
        &self.selector
    }

    fn evaluate(&self, request: &PolicyRequest) -> WardenResult<Option<RuleVerdict>> {
        let mut fields = Vec::new();
        string_fields(&request.args, "", &mut fields);

        for (path, value) in &fields {
            if value.chars().count() < MIN_SECRET_LEN {
                continue;
            }

            if self.raw_key.is_match(value) {
                warn!(field = %path, tool = %request.tool.name, "private key pattern in arguments");
                return Ok(Some(RuleVerdict::deny(
                    self.id(),
                    "KEY_EXFIL",
                    format!(
                        "Blocked: field \"{}\" contains what looks like a raw private key. \
                         Never include private keys in tool arguments.",
                        path
                    ),
                )));
            }

            if self.mnemonic.is_match(value) {
                return Ok(Some(RuleVerdict::deny(
                    self.id(),
                    "MNEMONIC_EXFIL",
                    format!(
                        "Blocked: field \"{}\" contains what looks like a seed phrase. \
                         Seed phrases must never be transmitted via tool calls.",
                        path
                    ),
                )));
            }

            if self.base64_run.is_match(value) {
                let entropy = shannon_entropy(value);
                if entropy > ENTROPY_THRESHOLD {
                    return Ok(Some(RuleVerdict::deny(
                        self.id(),
                        "ENTROPY_ANOMALY",
                        format!(
                            "Blocked: field \"{}\" contains a high-entropy blob ({:.1} \
                             bits/char). This may be an encoded secret; review the payload \
                             before retrying.",
                            path, entropy
                        ),
                    )));
                }
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use warden_contracts::{
        policy::PolicyAction,
        request::TurnContext,
        tool::{RiskLevel, ToolCategory, ToolDescriptor},
    };

    use super::*;

    fn exec_request(args: Value) -> PolicyRequest {
        PolicyRequest::new(
            ToolDescriptor::new("exec", ToolCategory::Vm, RiskLevel::Dangerous),
            args,
            TurnContext::default(),
        )
    }

    const RAW_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe512961708279f2e3e8a5d4b8e3e8a5";

    #[test]
    fn raw_private_key_is_denied_wherever_it_hides() {
        let rule = EntropyGuardRule::new();

        let verdict = rule
            .evaluate(&exec_request(json!({ "command": format!("curl -d {}", RAW_KEY) })))
            .unwrap()
            .unwrap();
        assert_eq!(verdict.action, PolicyAction::Deny);
        assert_eq!(verdict.reason_code, "KEY_EXFIL");
        assert!(verdict.message.contains("\"command\""));
    }

    #[test]
    fn nested_fields_are_reported_with_dotted_paths() {
        let rule = EntropyGuardRule::new();

        let verdict = rule
            .evaluate(&exec_request(json!({
                "options": { "headers": { "x-auth": RAW_KEY } }
            })))
            .unwrap()
            .unwrap();
        assert_eq!(verdict.reason_code, "KEY_EXFIL");
        assert!(
            verdict.message.contains("options.headers.x-auth"),
            "got: {}",
            verdict.message
        );
    }

    #[test]
    fn mnemonic_phrases_are_denied() {
        let rule = EntropyGuardRule::new();
        let phrase = "abandon ability able about above absent absorb abstract absurd abuse \
                      access accident";

        let verdict = rule
            .evaluate(&exec_request(json!({ "command": format!("echo '{}'", phrase) })))
            .unwrap()
            .unwrap();
        assert_eq!(verdict.reason_code, "MNEMONIC_EXFIL");
    }

    #[test]
    fn high_entropy_base64_blob_is_denied() {
        let rule = EntropyGuardRule::new();
        // Mixed-case alphanumeric noise: base64-shaped and genuinely random.
        let blob = "aK9zQ2xP7mW4vR8tY1uB5nC3dE6fG0hJqLsXiOwZeTgMpVkAyUj2rN4";

        let verdict = rule
            .evaluate(&exec_request(json!({ "payload": blob })))
            .unwrap()
            .unwrap();
        assert_eq!(verdict.reason_code, "ENTROPY_ANOMALY");
        assert!(verdict.message.contains("bits/char"));
    }

    #[test]
    fn repetitive_base64_shaped_text_is_not_denied() {
        let rule = EntropyGuardRule::new();
        // Base64-shaped but low-entropy: the frequency distribution gives
        // it away as non-random.
        let repetitive = "aaaaaaaaaabbbbbbbbbbaaaaaaaaaabbbbbbbbbbaaaaaaaaaa";

        assert!(rule
            .evaluate(&exec_request(json!({ "payload": repetitive })))
            .unwrap()
            .is_none());
    }

    #[test]
    fn short_strings_are_below_the_floor() {
        let rule = EntropyGuardRule::new();

        // 15 characters of randomness: never denied, regardless of content.
        assert!(rule
            .evaluate(&exec_request(json!({ "payload": "aK9zQ2xP7mW4vR8" })))
            .unwrap()
            .is_none());
    }

    #[test]
    fn ordinary_arguments_pass() {
        let rule = EntropyGuardRule::new();

        assert!(rule
            .evaluate(&exec_request(json!({
                "command": "cargo test --workspace",
                "options": { "cwd": "/workspace/project" }
            })))
            .unwrap()
            .is_none());
    }

    #[test]
    fn entropy_measurement_behaves() {
        assert_eq!(shannon_entropy(""), 0.0);
        assert_eq!(shannon_entropy("aaaa"), 0.0);
        // Two symbols, evenly distributed: exactly one bit per character.
        assert!((shannon_entropy("abababab") - 1.0).abs() < f64::EPSILON);
        // Random-looking mixed alphanumerics sit well above the threshold.
        assert!(shannon_entropy("aK9zQ2xP7mW4vR8tY1uB5nC3dE6fG0hJqLsXiOwZeTgMpVkAyUj2rN4") > 5.0);
    }
}
