use crate::config::ImporterConfig;
use crate::error::{RegistryError, SchemaError};
use crate::fs::EntryKind;
use crate::schema::schema_node::{Cardinality, NameMatcher, Schema, SchemaNode};
use crate::validation::ValidatorRegistry;
use log::{debug, error, info, warn};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tokio::fs;

const NODE_FIELDS: &[&str] = &[
    "kind",
    "type",
    "name",
    "pattern_name",
    "literal",
    "id",
    "semantical_name",
    "description",
    "extension",
    "cardinality",
    "validator",
    "children",
    "allow_unknown",
    "include",
];

const DOCUMENT_FIELDS: &[&str] = &["root", "definitions", "description", "version"];

/// Builds a [`Schema`] from a YAML or JSON schema description.
///
/// Validator references are resolved against the registry while the tree is
/// built, so a bad reference fails the import before any dataset is touched.
pub struct SchemaImporter<'r> {
    registry: &'r ValidatorRegistry,
    config: ImporterConfig,
}

impl<'r> SchemaImporter<'r> {
    pub fn new(registry: &'r ValidatorRegistry) -> Self {
        Self {
            registry,
            config: ImporterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ImporterConfig) -> Self {
        self.config = config;
        self
    }

    /// Import a schema from a YAML string
    #[cfg(feature = "yaml-support")]
    pub fn from_yaml(&self, yaml_str: &str) -> Result<Schema, SchemaError> {
        self.from_yaml_with_context(yaml_str, None)
    }

    #[cfg(feature = "yaml-support")]
    fn from_yaml_with_context(
        &self,
        yaml_str: &str,
        file_path: Option<&str>,
    ) -> Result<Schema, SchemaError> {
        let location = file_path.unwrap_or("<input>");
        debug!(
            "Parsing schema from YAML ({}, {} bytes)",
            location,
            yaml_str.len()
        );
        Self::check_not_empty(yaml_str, location)?;

        let value: Value = serde_yaml::from_str(yaml_str).map_err(|e| {
            let message = match e.location() {
                Some(position) => format!(
                    "YAML syntax error at line {}, column {}: {}",
                    position.line(),
                    position.column(),
                    e
                ),
                None => format!("YAML parsing error: {}", e),
            };
            error!("Failed to parse schema {}: {}", location, message);
            SchemaError::Parse {
                location: location.to_string(),
                message,
            }
        })?;

        self.from_value_with_context(&value, location)
    }

    /// Import a schema from a JSON string
    pub fn from_json(&self, json_str: &str) -> Result<Schema, SchemaError> {
        self.from_json_with_context(json_str, None)
    }

    fn from_json_with_context(
        &self,
        json_str: &str,
        file_path: Option<&str>,
    ) -> Result<Schema, SchemaError> {
        let location = file_path.unwrap_or("<input>");
        debug!(
            "Parsing schema from JSON ({}, {} bytes)",
            location,
            json_str.len()
        );
        Self::check_not_empty(json_str, location)?;

        let value: Value = serde_json::from_str(json_str).map_err(|e| {
            let message = format!(
                "JSON error at line {}, column {}: {}",
                e.line(),
                e.column(),
                e
            );
            error!("Failed to parse schema {}: {}", location, message);
            SchemaError::Parse {
                location: location.to_string(),
                message,
            }
        })?;

        self.from_value_with_context(&value, location)
    }

    /// Import a schema from a file; `.json` files are read as JSON, anything
    /// else as YAML.
    pub async fn from_file(&self, path: &str) -> Result<Schema, SchemaError> {
        info!("Loading schema from file: {}", path);

        if path.trim().is_empty() {
            return Err(SchemaError::malformed("<input>", "schema file path cannot be empty"));
        }

        let metadata = fs::metadata(path).await.map_err(|source| {
            error!("Cannot access schema file '{}': {}", path, source);
            SchemaError::Io {
                path: path.to_string(),
                source,
            }
        })?;
        if metadata.len() as usize > self.config.max_schema_size {
            return Err(SchemaError::malformed(
                path,
                format!(
                    "schema file is {} bytes, limit is {}",
                    metadata.len(),
                    self.config.max_schema_size
                ),
            ));
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|source| SchemaError::Io {
                path: path.to_string(),
                source,
            })?;
        debug!("Read {} bytes from {}", content.len(), path);

        if path.to_ascii_lowercase().ends_with(".json") {
            self.from_json_with_context(&content, Some(path))
        } else {
            self.from_yaml_file(&content, path)
        }
    }

    #[cfg(feature = "yaml-support")]
    fn from_yaml_file(&self, content: &str, path: &str) -> Result<Schema, SchemaError> {
        self.from_yaml_with_context(content, Some(path))
    }

    #[cfg(not(feature = "yaml-support"))]
    fn from_yaml_file(&self, _content: &str, path: &str) -> Result<Schema, SchemaError> {
        Err(SchemaError::Parse {
            location: path.to_string(),
            message: "YAML schemas require the `yaml-support` feature".to_string(),
        })
    }

    /// Import a schema from an already deserialized document
    pub fn from_value(&self, value: &Value) -> Result<Schema, SchemaError> {
        self.from_value_with_context(value, "<input>")
    }

    fn from_value_with_context(&self, value: &Value, source: &str) -> Result<Schema, SchemaError> {
        self.config
            .validate()
            .map_err(|reason| SchemaError::malformed("<config>", reason))?;

        let document = match value {
            Value::Object(map) => map,
            Value::Null => {
                return Err(SchemaError::Parse {
                    location: source.to_string(),
                    message: "schema document is empty".to_string(),
                })
            }
            other => {
                return Err(SchemaError::malformed(
                    "<document>",
                    format!("schema document must be a mapping, found {}", type_name(other)),
                ))
            }
        };

        let empty = Map::new();
        let (root, definitions) = if document.contains_key("root") {
            if self.config.deny_unknown_fields {
                if let Some(field) = document.keys().find(|k| !DOCUMENT_FIELDS.contains(&k.as_str())) {
                    return Err(SchemaError::malformed(
                        "<document>",
                        format!("unknown top-level field `{}`", field),
                    ));
                }
            }
            let definitions = match document.get("definitions") {
                None | Some(Value::Null) => &empty,
                Some(Value::Object(map)) => map,
                Some(other) => {
                    return Err(SchemaError::malformed(
                        "definitions",
                        format!("expected a mapping, found {}", type_name(other)),
                    ))
                }
            };
            (&document["root"], definitions)
        } else {
            (value, &empty)
        };

        let mut builder = TreeBuilder {
            registry: self.registry,
            config: &self.config,
            definitions,
            include_stack: Vec::new(),
            used_definitions: BTreeSet::new(),
        };
        let root = builder.build_node(root, "root", 0, true)?;

        for name in definitions.keys() {
            if !builder.used_definitions.contains(name) {
                warn!("Definition '{}' in {} is never included", name, source);
            }
        }

        let schema = Schema::new(root)?;
        info!(
            "Imported schema from {} ({} nodes, max depth {})",
            source,
            schema.node_count(),
            schema.max_depth()
        );
        Ok(schema)
    }

    fn check_not_empty(text: &str, location: &str) -> Result<(), SchemaError> {
        if text.trim().is_empty() {
            error!("Schema input is empty ({})", location);
            return Err(SchemaError::Parse {
                location: location.to_string(),
                message: "input string is empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Recursive node construction state for one import
struct TreeBuilder<'a> {
    registry: &'a ValidatorRegistry,
    config: &'a ImporterConfig,
    definitions: &'a Map<String, Value>,
    include_stack: Vec<String>,
    used_definitions: BTreeSet<String>,
}

impl<'a> TreeBuilder<'a> {
    fn build_node(
        &mut self,
        value: &Value,
        location: &str,
        depth: usize,
        is_root: bool,
    ) -> Result<SchemaNode, SchemaError> {
        if depth > self.config.max_schema_depth {
            return Err(SchemaError::malformed(
                location,
                format!("schema is deeper than {} levels", self.config.max_schema_depth),
            ));
        }

        let mapping = value.as_object().ok_or_else(|| {
            SchemaError::malformed(location, format!("expected a mapping, found {}", type_name(value)))
        })?;

        let stack_len = self.include_stack.len();
        let fields = self.expand_includes(mapping, location)?;
        let node = self.build_from_fields(&fields, location, depth, is_root);
        self.include_stack.truncate(stack_len);
        node
    }

    /// Merge included definitions under the node's own fields.
    fn expand_includes(
        &mut self,
        mapping: &Map<String, Value>,
        location: &str,
    ) -> Result<Map<String, Value>, SchemaError> {
        let mut merged = mapping.clone();
        while let Some(include) = merged.remove("include") {
            let include_location = format!("{}.include", location);
            let name = include.as_str().ok_or_else(|| {
                SchemaError::malformed(&include_location, "include must be a definition name")
            })?;

            if let Some(position) = self.include_stack.iter().position(|n| n == name) {
                let mut chain = self.include_stack[position..].to_vec();
                chain.push(name.to_string());
                return Err(SchemaError::CyclicInclude {
                    location: location.to_string(),
                    chain,
                });
            }

            let definition = self
                .definitions
                .get(name)
                .ok_or_else(|| SchemaError::UnknownInclude {
                    location: include_location.clone(),
                    name: name.to_string(),
                })?
                .as_object()
                .ok_or_else(|| {
                    SchemaError::malformed(format!("definitions.{}", name), "definition must be a mapping")
                })?;

            debug!("Expanding include '{}' at {}", name, location);
            self.include_stack.push(name.to_string());
            self.used_definitions.insert(name.to_string());

            let mut base = definition.clone();
            for (key, value) in merged {
                base.insert(key, value);
            }
            merged = base;
        }
        Ok(merged)
    }

    fn build_from_fields(
        &mut self,
        fields: &Map<String, Value>,
        location: &str,
        depth: usize,
        is_root: bool,
    ) -> Result<SchemaNode, SchemaError> {
        if self.config.deny_unknown_fields {
            if let Some(field) = fields.keys().find(|k| !NODE_FIELDS.contains(&k.as_str())) {
                return Err(SchemaError::malformed(location, format!("unknown field `{}`", field)));
            }
        }

        let kind = self.parse_kind(fields, location)?;

        let literal = get_bool(fields, "literal", location)?.unwrap_or(false);
        let name = match get_aliased_str(fields, "name", "pattern_name", location)? {
            Some(name) if literal => NameMatcher::literal(name),
            Some(pattern) => NameMatcher::pattern(pattern).map_err(|source| SchemaError::InvalidPattern {
                location: format!("{}.name", location),
                pattern: pattern.to_string(),
                source,
            })?,
            None if is_root => NameMatcher::literal("root"),
            None => return Err(SchemaError::malformed(location, "missing field `name`")),
        };

        let mut node = SchemaNode::new(kind, name);

        if let Some(id) = get_aliased_str(fields, "id", "semantical_name", location)? {
            node = node.with_semantic_name(id);
        }
        if let Some(description) = get_str(fields, "description", location)? {
            node = node.with_description(description);
        }
        if let Some(extension) = get_str(fields, "extension", location)? {
            if kind != EntryKind::File {
                return Err(SchemaError::malformed(
                    format!("{}.extension", location),
                    "only file nodes can declare an extension",
                ));
            }
            node = node.with_extension(extension);
        }
        if let Some(cardinality) = get_str(fields, "cardinality", location)? {
            let parsed = Cardinality::parse(cardinality).ok_or_else(|| {
                SchemaError::malformed(
                    format!("{}.cardinality", location),
                    format!(
                        "unknown cardinality '{}' (expected one, zero_or_one, zero_or_more or one_or_more)",
                        cardinality
                    ),
                )
            })?;
            node = node.with_cardinality(parsed);
        }
        if let Some(allow_unknown) = get_bool(fields, "allow_unknown", location)? {
            node = node.allowing_unknown(allow_unknown);
        }
        if let Some(validator_ref) = get_str(fields, "validator", location)? {
            let validator = self.registry.resolve(validator_ref).map_err(|e| match e {
                RegistryError::UnknownValidator(name) | RegistryError::DuplicateName(name) => {
                    error!("Unresolved validator '{}' at {}", name, location);
                    SchemaError::UnknownValidator {
                        location: format!("{}.validator", location),
                        name,
                    }
                }
            })?;
            node = node.with_validator(validator_ref, validator);
        }

        match fields.get("children") {
            None | Some(Value::Null) => {}
            Some(Value::Array(children)) => {
                if kind == EntryKind::File && !children.is_empty() {
                    return Err(SchemaError::malformed(location, "a file node cannot have children"));
                }
                for (index, child) in children.iter().enumerate() {
                    let child_location = format!("{}.children[{}]", location, index);
                    let child_node = self.build_node(child, &child_location, depth + 1, false)?;
                    node = node.with_child(child_node);
                }
            }
            Some(other) => {
                return Err(SchemaError::malformed(
                    format!("{}.children", location),
                    format!("expected a sequence, found {}", type_name(other)),
                ))
            }
        }

        Ok(node)
    }

    fn parse_kind(&self, fields: &Map<String, Value>, location: &str) -> Result<EntryKind, SchemaError> {
        let kind = get_aliased_str(fields, "kind", "type", location)?
            .ok_or_else(|| SchemaError::malformed(location, "missing field `kind`"))?;
        match kind.to_ascii_lowercase().as_str() {
            "file" => Ok(EntryKind::File),
            "directory" | "dir" => Ok(EntryKind::Directory),
            other => Err(SchemaError::malformed(
                format!("{}.kind", location),
                format!("unknown node kind '{}' (expected file or directory)", other),
            )),
        }
    }
}

fn get_str<'v>(fields: &'v Map<String, Value>, key: &str, location: &str) -> Result<Option<&'v str>, SchemaError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(other) => Err(SchemaError::malformed(
            format!("{}.{}", location, key),
            format!("expected a string, found {}", type_name(other)),
        )),
    }
}

/// Read a field that may also be spelled `alias`; setting both is an error
fn get_aliased_str<'v>(
    fields: &'v Map<String, Value>,
    key: &str,
    alias: &str,
    location: &str,
) -> Result<Option<&'v str>, SchemaError> {
    match (get_str(fields, key, location)?, get_str(fields, alias, location)?) {
        (Some(_), Some(_)) => Err(SchemaError::malformed(
            location,
            format!("both `{}` and `{}` are set", key, alias),
        )),
        (value, None) | (None, value) => Ok(value),
    }
}

fn get_bool(fields: &Map<String, Value>, key: &str, location: &str) -> Result<Option<bool>, SchemaError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(value)) => Ok(Some(*value)),
        Some(other) => Err(SchemaError::malformed(
            format!("{}.{}", location, key),
            format!("expected a boolean, found {}", type_name(other)),
        )),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn import(json: &str) -> Result<Schema, SchemaError> {
        let registry = ValidatorRegistry::with_builtins();
        SchemaImporter::new(&registry).from_json(json)
    }

    #[test]
    fn test_bare_root_document() {
        let schema = import(
            r#"{"kind": "directory", "children": [
                {"kind": "file", "name": "README.md", "literal": true, "cardinality": "optional"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(schema.root().semantic_name(), "root");
        let readme = &schema.root().children()[0];
        assert!(readme.name().is_literal());
        assert_eq!(readme.cardinality(), Cardinality::ZeroOrOne);
        assert_eq!(readme.depth(), 1);
    }

    #[test]
    fn test_type_alias_and_conflict() {
        assert!(import(r#"{"type": "directory"}"#).is_ok());
        let error = import(r#"{"type": "directory", "kind": "directory"}"#).unwrap_err();
        assert_eq!(error.location(), "root");
    }

    #[test]
    fn test_long_field_spellings() {
        let schema = import(
            r#"{"type": "directory", "children": [
                {"type": "file", "pattern_name": "labels", "semantical_name": "label_table", "extension": "csv"}
            ]}"#,
        )
        .unwrap();
        let labels = &schema.root().children()[0];
        assert_eq!(labels.semantic_name(), "label_table");
        assert_eq!(labels.name().as_str(), "labels");
        assert!(labels.matches("labels_2024.csv"));

        let error = import(r#"{"kind": "directory", "children": [{"kind": "file", "name": "a", "pattern_name": "b"}]}"#)
            .unwrap_err();
        assert_eq!(error.location(), "root.children[0]");
        assert!(error.to_string().contains("both `name` and `pattern_name` are set"));

        let error = import(r#"{"kind": "directory", "id": "x", "semantical_name": "y"}"#).unwrap_err();
        assert!(error.to_string().contains("both `id` and `semantical_name` are set"));
    }

    #[test]
    fn test_unknown_field_rejected_unless_permissive() {
        let json = r#"{"kind": "directory", "owner": "alice"}"#;
        let error = import(json).unwrap_err();
        assert!(error.to_string().contains("unknown field `owner`"));

        let registry = ValidatorRegistry::new();
        let permissive = SchemaImporter::new(&registry).with_config(ImporterConfig::permissive());
        assert!(permissive.from_json(json).is_ok());
    }

    #[test]
    fn test_error_locations() {
        let error = import(
            r#"{"kind": "directory", "children": [
                {"kind": "file", "name": "a"},
                {"kind": "file", "name": "b", "cardinality": "plenty"}
            ]}"#,
        )
        .unwrap_err();
        assert_eq!(error.location(), "root.children[1].cardinality");

        let error = import(r#"{"kind": "directory", "children": [{"kind": "file", "name": "(x"}]}"#)
            .unwrap_err();
        assert!(matches!(error, SchemaError::InvalidPattern { .. }));
        assert_eq!(error.location(), "root.children[0].name");
    }

    #[test]
    fn test_depth_limit() {
        let registry = ValidatorRegistry::new();
        let config = ImporterConfig {
            max_schema_depth: 1,
            ..ImporterConfig::default()
        };
        let result = SchemaImporter::new(&registry).with_config(config).from_json(
            r#"{"kind": "directory", "children": [
                {"kind": "directory", "name": "a", "children": [{"kind": "file", "name": "b"}]}
            ]}"#,
        );
        assert_eq!(result.unwrap_err().location(), "root.children[0].children[0]");
    }
}
