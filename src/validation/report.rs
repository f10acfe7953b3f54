use crate::schema::SchemaNode;
use crate::validation::actions::ActionResult;
use crate::validation::validator_registry::ValidatorOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("ERROR"),
            Severity::Warning => f.write_str("WARNING"),
        }
    }
}

/// Category of a structural discrepancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    MissingRequiredEntry,
    AmbiguousMatch,
    UnexpectedEntry,
    CustomValidationFailed,
    AccessError,
    KindMismatch,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::MissingRequiredEntry => "MISSING_REQUIRED_ENTRY",
            ViolationKind::AmbiguousMatch => "AMBIGUOUS_MATCH",
            ViolationKind::UnexpectedEntry => "UNEXPECTED_ENTRY",
            ViolationKind::CustomValidationFailed => "CUSTOM_VALIDATION_FAILED",
            ViolationKind::AccessError => "ACCESS_ERROR",
            ViolationKind::KindMismatch => "KIND_MISMATCH",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discrepancy between the schema and the walked tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,

    /// Entry path, or the directory path for missing/ambiguous entries
    pub path: String,

    /// Semantic name of the schema node the violation is about
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,

    pub depth: usize,
    pub reason: String,
    pub severity: Severity,
}

impl Violation {
    pub fn new(
        kind: ViolationKind,
        path: impl Into<String>,
        node: Option<&SchemaNode>,
        depth: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            node: node.map(|n| n.semantic_name().to_string()),
            depth,
            reason: reason.into(),
            severity: Severity::Error,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} at {}", self.severity, self.kind, self.path)?;
        if let Some(node) = &self.node {
            write!(f, " (node '{}')", node)?;
        }
        write!(f, ": {}", self.reason)
    }
}

/// Schema node an entry was matched to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub semantic_name: String,
    pub depth: usize,
}

impl NodeRef {
    pub fn of(node: &SchemaNode) -> Self {
        Self {
            semantic_name: node.semantic_name().to_string(),
            depth: node.depth(),
        }
    }
}

/// Outcome of matching one real entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub path: String,

    /// `None` for entries no schema node claimed
    pub node: Option<NodeRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub validator_outcome: Option<ValidatorOutcome>,

    /// Violations raised against this entry itself
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub violations: Vec<Violation>,
}

impl MatchResult {
    pub fn matched(path: impl Into<String>, node: &SchemaNode) -> Self {
        Self {
            path: path.into(),
            node: Some(NodeRef::of(node)),
            validator_outcome: None,
            violations: Vec::new(),
        }
    }

    pub fn unmatched(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            node: None,
            validator_outcome: None,
            violations: Vec::new(),
        }
    }
}

/// Aggregate result of one validation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Dataset root the run was started at
    pub root: String,

    /// All violations, in traversal order
    pub violations: Vec<Violation>,

    pub matches: Vec<MatchResult>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub action_results: Vec<ActionResult>,

    /// Directory listings performed
    pub listings: usize,

    /// Real entries seen across all listings
    pub entries_visited: usize,
}

impl ValidationReport {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// True when no violation has `Error` severity
    pub fn is_valid(&self) -> bool {
        !self.violations.iter().any(Violation::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.severity == Severity::Warning)
    }

    pub fn violations_of(&self, kind: ViolationKind) -> Vec<&Violation> {
        self.violations.iter().filter(|v| v.kind == kind).collect()
    }

    pub fn count(&self, kind: ViolationKind) -> usize {
        self.violations.iter().filter(|v| v.kind == kind).count()
    }

    /// Paths matched to the node with the given semantic name
    pub fn paths_for(&self, semantic_name: &str) -> Vec<&str> {
        self.matches
            .iter()
            .filter(|m| m.node.as_ref().map_or(false, |n| n.semantic_name == semantic_name))
            .map(|m| m.path.as_str())
            .collect()
    }

    pub fn summary(&self) -> String {
        let errors = self.errors().count();
        let warnings = self.warnings().count();
        if self.is_valid() {
            format!(
                "{}: valid ({} entries matched, {} warnings)",
                self.root,
                self.matches.iter().filter(|m| m.node.is_some()).count(),
                warnings
            )
        } else {
            format!("{}: invalid ({} errors, {} warnings)", self.root, errors, warnings)
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        for violation in &self.violations {
            writeln!(f, "  {}", violation)?;
        }
        for action in self.action_results.iter().filter(|a| !a.success) {
            writeln!(f, "  {}", action)?;
        }
        Ok(())
    }
}
