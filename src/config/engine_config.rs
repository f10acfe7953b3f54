use crate::validation::Severity;
use serde::{Deserialize, Serialize};

/// Which schema child claims an entry that several children could match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Children claim in declaration order
    #[default]
    FirstDeclaredWins,

    /// Literal-named children claim first, then pattern children; each
    /// group in declaration order
    LiteralFirst,
}

/// Configuration for a validation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Severity of entries no schema child claims (Default: Error)
    pub unexpected_entry_severity: Severity,

    /// Claim order among overlapping schema children (Default: FirstDeclaredWins)
    pub overlap_policy: OverlapPolicy,

    /// Walk sibling subdirectories concurrently (Default: false)
    pub parallel_subtrees: bool,

    /// Upper bound on directory listings in flight across the whole run,
    /// and on sibling walks polled together per directory (Default: 8)
    pub max_concurrent_walks: usize,

    /// Run actions from the attached action registry (Default: false)
    pub run_actions: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unexpected_entry_severity: Severity::Error,
            overlap_policy: OverlapPolicy::FirstDeclaredWins,
            parallel_subtrees: false,
            max_concurrent_walks: 8,
            run_actions: false,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every discrepancy is an error; same as the default
    pub fn strict() -> Self {
        Self::default()
    }

    /// Unexpected entries are reported but do not fail the run
    pub fn lenient() -> Self {
        Self {
            unexpected_entry_severity: Severity::Warning,
            ..Self::default()
        }
    }

    /// Concurrent sibling walks for high-latency backends
    pub fn parallel() -> Self {
        Self {
            parallel_subtrees: true,
            max_concurrent_walks: 32,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_walks == 0 {
            return Err("max_concurrent_walks must be greater than 0".to_string());
        }

        Ok(())
    }
}
