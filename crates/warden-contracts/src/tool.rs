//! Tool descriptors and rule selectors.
//!
//! A `ToolDescriptor` is the static registration-time metadata of a tool —
//! the policy engine never touches the tool's behavior, only this
//! description. A `ToolSelector` declares which tools a rule inspects.

use serde::{Deserialize, Serialize};

/// Static danger classification assigned to a tool when it is registered.
///
/// Fixed for the lifetime of the tool; policy rules may select on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Read-only or otherwise harmless.
    Safe,
    /// Side effects that are cheap to reverse.
    Caution,
    /// Moves money, mutates the agent itself, or touches the host.
    Dangerous,
    /// Never executed, regardless of who asks.
    Forbidden,
}

/// Functional grouping of tools, used by category selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// Sandbox shell and filesystem access.
    Vm,
    /// Hosting-platform operations (sandboxes, ports, domains).
    Platform,
    /// Tools that modify the agent's own code, prompts, or schedule.
    SelfMod,
    /// Tools that move money.
    Financial,
    /// Balance checks and survival-state management.
    Survival,
    /// Skill installation and management.
    Skills,
    /// Version-control operations.
    Git,
    /// On-chain registry operations.
    Registry,
    /// Spawning and funding child agents.
    Replication,
    /// Memory read/write tools.
    Memory,
}

/// The static descriptor of a registered tool.
///
/// Built once at tool registration and embedded in every `PolicyRequest`.
/// The engine reads the name for selector matching and audit rows, and the
/// risk level for the final decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool name, e.g. `"transfer_credits"`.
    pub name: String,
    /// Functional grouping.
    pub category: ToolCategory,
    /// Static danger classification.
    pub risk_level: RiskLevel,
}

impl ToolDescriptor {
    /// Construct a descriptor.
    pub fn new(name: impl Into<String>, category: ToolCategory, risk_level: RiskLevel) -> Self {
        Self {
            name: name.into(),
            category,
            risk_level,
        }
    }
}

/// Declares which tools a policy rule applies to.
///
/// A rule is only ever evaluated against tools its selector matches — this
/// keeps every rule family independently testable in isolation. The enum is
/// matched exhaustively; an unrecognized selector kind cannot silently
/// match nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum ToolSelector {
    /// Matches every tool.
    All,
    /// Matches tools by exact name.
    Name { names: Vec<String> },
    /// Matches tools by category.
    Category { categories: Vec<ToolCategory> },
    /// Matches tools by risk level.
    Risk { levels: Vec<RiskLevel> },
}

impl ToolSelector {
    /// Build a name selector from string literals.
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Name {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Build a category selector.
    pub fn categories(categories: impl IntoIterator<Item = ToolCategory>) -> Self {
        Self::Category {
            categories: categories.into_iter().collect(),
        }
    }

    /// Build a risk-level selector.
    pub fn risks(levels: impl IntoIterator<Item = RiskLevel>) -> Self {
        Self::Risk {
            levels: levels.into_iter().collect(),
        }
    }

    /// Return true if this selector matches the given tool descriptor.
    pub fn matches(&self, tool: &ToolDescriptor) -> bool {
        match self {
            ToolSelector::All => true,
            ToolSelector::Name { names } => names.iter().any(|n| n == &tool.name),
            ToolSelector::Category { categories } => categories.contains(&tool.category),
            ToolSelector::Risk { levels } => levels.contains(&tool.risk_level),
        }
    }
}
