use crate::error::SchemaError;
use crate::fs::{Entry, EntryKind};
use crate::validation::EntryValidator;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How many sibling entries may match one schema node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    #[default]
    ExactlyOne,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

impl Cardinality {
    /// Parse the schema-file spelling of a cardinality
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "one" | "exactly_one" => Some(Cardinality::ExactlyOne),
            "zero_or_one" | "optional" => Some(Cardinality::ZeroOrOne),
            "zero_or_more" | "any" => Some(Cardinality::ZeroOrMore),
            "one_or_more" | "many" => Some(Cardinality::OneOrMore),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Cardinality::ExactlyOne => "exactly_one",
            Cardinality::ZeroOrOne => "zero_or_one",
            Cardinality::ZeroOrMore => "zero_or_more",
            Cardinality::OneOrMore => "one_or_more",
        }
    }

    /// At least one match is required
    pub fn is_required(&self) -> bool {
        matches!(self, Cardinality::ExactlyOne | Cardinality::OneOrMore)
    }

    /// Every match is accepted individually
    pub fn allows_many(&self) -> bool {
        matches!(self, Cardinality::ZeroOrMore | Cardinality::OneOrMore)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicate on an entry's base name.
///
/// Patterns are anchored at the start of the name only, so `data` accepts
/// `data_2024`; add `$` to pin the end.
#[derive(Debug, Clone)]
pub enum NameMatcher {
    Literal(String),
    Pattern { source: String, regex: Regex },
}

impl NameMatcher {
    pub fn literal(name: impl Into<String>) -> Self {
        NameMatcher::Literal(name.into())
    }

    pub fn pattern(source: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})", source))?;
        Ok(NameMatcher::Pattern {
            source: source.to_string(),
            regex,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            NameMatcher::Literal(literal) => literal == name,
            NameMatcher::Pattern { regex, .. } => regex.is_match(name),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, NameMatcher::Literal(_))
    }

    /// The text as written in the schema
    pub fn as_str(&self) -> &str {
        match self {
            NameMatcher::Literal(literal) => literal,
            NameMatcher::Pattern { source, .. } => source,
        }
    }
}

/// One declarative expectation in the schema tree
#[derive(Clone)]
pub struct SchemaNode {
    kind: EntryKind,
    name: NameMatcher,
    semantic_name: String,
    description: Option<String>,
    extension: Option<String>,
    cardinality: Cardinality,
    children: Vec<SchemaNode>,
    validator_ref: Option<String>,
    validator: Option<Arc<dyn EntryValidator>>,
    allow_unknown: bool,
    depth: usize,
}

impl SchemaNode {
    pub fn new(kind: EntryKind, name: NameMatcher) -> Self {
        Self {
            kind,
            semantic_name: name.as_str().to_string(),
            name,
            description: None,
            extension: None,
            cardinality: Cardinality::default(),
            children: Vec::new(),
            validator_ref: None,
            validator: None,
            allow_unknown: false,
            depth: 0,
        }
    }

    /// File node matched by a regular expression
    pub fn file(pattern: &str) -> Result<Self, SchemaError> {
        Ok(Self::new(EntryKind::File, Self::compile(pattern)?))
    }

    /// Directory node matched by a regular expression
    pub fn directory(pattern: &str) -> Result<Self, SchemaError> {
        Ok(Self::new(EntryKind::Directory, Self::compile(pattern)?))
    }

    pub fn literal_file(name: &str) -> Self {
        Self::new(EntryKind::File, NameMatcher::literal(name))
    }

    pub fn literal_directory(name: &str) -> Self {
        Self::new(EntryKind::Directory, NameMatcher::literal(name))
    }

    fn compile(pattern: &str) -> Result<NameMatcher, SchemaError> {
        NameMatcher::pattern(pattern).map_err(|source| SchemaError::InvalidPattern {
            location: "name".to_string(),
            pattern: pattern.to_string(),
            source,
        })
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    pub fn with_child(mut self, child: SchemaNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = SchemaNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Attach an already resolved validator together with its symbolic name
    pub fn with_validator(mut self, name: impl Into<String>, validator: Arc<dyn EntryValidator>) -> Self {
        self.validator_ref = Some(name.into());
        self.validator = Some(validator);
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        self.extension = Some(extension.trim_start_matches('.').to_string());
        self
    }

    pub fn with_semantic_name(mut self, semantic_name: impl Into<String>) -> Self {
        self.semantic_name = semantic_name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn allowing_unknown(mut self, allow_unknown: bool) -> Self {
        self.allow_unknown = allow_unknown;
        self
    }

    /// Name predicate, including the extension constraint
    pub fn matches(&self, name: &str) -> bool {
        if let Some(extension) = &self.extension {
            let suffix_ok = name.len() > extension.len() + 1
                && name
                    .strip_suffix(extension.as_str())
                    .map_or(false, |stem| stem.ends_with('.'));
            if !suffix_ok {
                return false;
            }
        }
        self.name.matches(name)
    }

    pub fn accepts_kind(&self, actual: EntryKind) -> bool {
        self.kind == actual
    }

    /// Names that could not be read exactly never match
    pub fn accepts(&self, entry: &Entry) -> bool {
        !entry.lossy_name && self.accepts_kind(entry.kind) && self.matches(&entry.name)
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn name(&self) -> &NameMatcher {
        &self.name
    }

    pub fn semantic_name(&self) -> &str {
        &self.semantic_name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn children(&self) -> &[SchemaNode] {
        &self.children
    }

    pub fn validator_ref(&self) -> Option<&str> {
        self.validator_ref.as_deref()
    }

    pub fn validator(&self) -> Option<&Arc<dyn EntryValidator>> {
        self.validator.as_ref()
    }

    pub fn allow_unknown(&self) -> bool {
        self.allow_unknown
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// A leaf is never listed: files, and directories without children
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn assign_depth(&mut self, depth: usize) {
        self.depth = depth;
        for child in &mut self.children {
            child.assign_depth(depth + 1);
        }
    }

    fn visit<'a>(&'a self, out: &mut Vec<&'a SchemaNode>) {
        out.push(self);
        for child in &self.children {
            child.visit(out);
        }
    }
}

impl fmt::Debug for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaNode")
            .field("kind", &self.kind)
            .field("name", &self.name.as_str())
            .field("semantic_name", &self.semantic_name)
            .field("cardinality", &self.cardinality)
            .field("validator", &self.validator_ref)
            .field("allow_unknown", &self.allow_unknown)
            .field("depth", &self.depth)
            .field("children", &self.children)
            .finish()
    }
}

/// A complete, immutable schema tree
#[derive(Debug, Clone)]
pub struct Schema {
    root: SchemaNode,
}

impl Schema {
    /// Check the tree invariants and annotate depth on every node.
    pub fn new(mut root: SchemaNode) -> Result<Self, SchemaError> {
        if !root.is_dir() {
            return Err(SchemaError::malformed("root", "schema root must be a directory"));
        }
        Self::check_node(&root, "root")?;
        root.assign_depth(0);
        Ok(Self { root })
    }

    fn check_node(node: &SchemaNode, location: &str) -> Result<(), SchemaError> {
        if !node.is_dir() && !node.children.is_empty() {
            return Err(SchemaError::malformed(location, "a file node cannot have children"));
        }
        if node.is_dir() && node.extension.is_some() {
            return Err(SchemaError::malformed(location, "only file nodes can declare an extension"));
        }
        for (index, child) in node.children.iter().enumerate() {
            Self::check_node(child, &format!("{}.children[{}]", location, index))?;
        }
        Ok(())
    }

    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    /// All nodes in depth-first declaration order, root first
    pub fn nodes(&self) -> Vec<&SchemaNode> {
        let mut out = Vec::new();
        self.root.visit(&mut out);
        out
    }

    pub fn max_depth(&self) -> usize {
        self.nodes().iter().map(|node| node.depth).max().unwrap_or(0)
    }

    pub fn node_count(&self) -> usize {
        self.nodes().len()
    }

    /// First node with the given semantic name
    pub fn find(&self, semantic_name: &str) -> Option<&SchemaNode> {
        self.nodes()
            .into_iter()
            .find(|node| node.semantic_name == semantic_name)
    }
}
