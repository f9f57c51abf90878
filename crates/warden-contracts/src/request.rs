//! The policy request: one proposed tool call awaiting authorization.
//!
//! Built by the tool-execution layer, consumed synchronously by
//! `PolicyEngine::evaluate`, never persisted. All fields are plain data —
//! collaborators a rule needs (spend tracker, decision store, treasury
//! policy) are captured at rule construction, not smuggled through the
//! request.

use serde::{Deserialize, Serialize};

use crate::{policy::InputSource, tool::ToolDescriptor};

/// Per-turn context the tool layer attaches to every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnContext {
    /// Who triggered the turn this call belongs to. `None` when the origin
    /// is unknown — which is treated as the least-trusted tier.
    pub input_source: Option<InputSource>,
    /// How many tool calls have already executed this turn.
    pub tool_calls_this_turn: u32,
    /// How many transfer-class calls have already executed this turn.
    pub transfers_this_turn: u32,
    /// Snapshot of the credit balance, when the caller has one. Rules that
    /// need it (minimum reserve) have no opinion when it is absent.
    pub credits_balance_cents: Option<u64>,
}

/// One proposed tool call awaiting authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRequest {
    /// Static descriptor of the target tool.
    pub tool: ToolDescriptor,
    /// The parsed call arguments, as a JSON object.
    pub args: serde_json::Value,
    /// Context of the turn issuing the call.
    pub turn: TurnContext,
}

impl PolicyRequest {
    /// Construct a request.
    pub fn new(tool: ToolDescriptor, args: serde_json::Value, turn: TurnContext) -> Self {
        Self { tool, args, turn }
    }

    /// Fetch a top-level string argument by key.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(serde_json::Value::as_str)
    }

    /// Fetch a top-level unsigned-integer argument by key.
    ///
    /// Returns `None` both when the key is absent and when the value is not
    /// a non-negative integer; rules that must distinguish the two inspect
    /// `args` directly.
    pub fn u64_arg(&self, key: &str) -> Option<u64> {
        self.args.get(key).and_then(serde_json::Value::as_u64)
    }
}
