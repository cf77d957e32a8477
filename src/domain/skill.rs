//! Remote skill identities.
//!
//! A skill is provisioned once on the remote side and then referenced by
//! its handle for every query that needs it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The three capabilities a workflow is assembled from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Document retrieval against the search index
    Retrieval,

    /// Data analysis over retrieved material
    Analysis,

    /// Reader-facing response synthesis
    Synthesis,
}

impl Capability {
    /// All capabilities in workflow order
    pub const ALL: [Capability; 3] = [
        Capability::Retrieval,
        Capability::Analysis,
        Capability::Synthesis,
    ];

    /// Stable slot index, used by fixed-size per-capability tables
    pub fn index(self) -> usize {
        match self {
            Capability::Retrieval => 0,
            Capability::Analysis => 1,
            Capability::Synthesis => 2,
        }
    }

    /// Short lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Retrieval => "retrieval",
            Capability::Analysis => "analysis",
            Capability::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provisioned remote skill.
///
/// Immutable after creation. The registry owns the only copy and hands out
/// shared references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillHandle {
    /// Remote identifier
    pub id: String,

    /// What this skill does
    pub capability: Capability,

    /// Human-readable name
    pub name: String,
}

impl SkillHandle {
    pub fn new(id: impl Into<String>, capability: Capability, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capability,
            name: name.into(),
        }
    }
}

/// What the registry asks a provider to create for a capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDefinition {
    /// Remote display name
    pub name: String,

    /// Model deployment backing the skill
    #[serde(default = "default_model")]
    pub model: String,

    /// System instructions for the skill
    #[serde(default)]
    pub instructions: String,

    /// Provider-specific tool definitions
    #[serde(default)]
    pub tools: Vec<serde_json::Value>,

    /// Provider-specific tool resources
    #[serde(default)]
    pub tool_resources: Option<serde_json::Value>,
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

impl SkillDefinition {
    /// Built-in definition for a capability
    pub fn default_for(capability: Capability) -> Self {
        let (name, instructions, tools) = match capability {
            Capability::Retrieval => (
                "retrieval_skill",
                "You are a research assistant. Search the document index for material \
                 relevant to the question and report the key findings with their sources.",
                vec![serde_json::json!({ "type": "file_search" })],
            ),
            Capability::Analysis => (
                "analysis_skill",
                "You are a data analyst. Examine the research findings you are given, \
                 identify trends and comparisons, and present structured insights.",
                vec![serde_json::json!({ "type": "code_interpreter" })],
            ),
            Capability::Synthesis => (
                "synthesis_skill",
                "You are a writer. Turn the research findings you are given into a clear, \
                 reader-friendly answer.",
                Vec::new(),
            ),
        };

        Self {
            name: name.to_string(),
            model: default_model(),
            instructions: instructions.to_string(),
            tools,
            tool_resources: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_indices_are_distinct() {
        let mut seen = [false; 3];
        for capability in Capability::ALL {
            assert!(!seen[capability.index()]);
            seen[capability.index()] = true;
        }
    }

    #[test]
    fn test_capability_serialization() {
        let json = serde_json::to_string(&Capability::Synthesis).unwrap();
        assert_eq!(json, "\"synthesis\"");
        assert_eq!(Capability::Retrieval.to_string(), "retrieval");
    }

    #[test]
    fn test_default_definitions() {
        let retrieval = SkillDefinition::default_for(Capability::Retrieval);
        assert_eq!(retrieval.name, "retrieval_skill");
        assert_eq!(retrieval.tools.len(), 1);

        let synthesis = SkillDefinition::default_for(Capability::Synthesis);
        assert!(synthesis.tools.is_empty());
        assert_eq!(synthesis.model, "gpt-4o");
    }
}
