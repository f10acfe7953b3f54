use super::schema_node::{Schema, SchemaNode};
use std::fmt;

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = self.root();
        writeln!(f, "{}", describe_node(root))?;
        let count = root.children().len();
        for (index, child) in root.children().iter().enumerate() {
            write_tree(f, child, "", index + 1 == count)?;
        }
        Ok(())
    }
}

fn write_tree(f: &mut fmt::Formatter<'_>, node: &SchemaNode, prefix: &str, last: bool) -> fmt::Result {
    let branch = if last { "└── " } else { "├── " };
    writeln!(f, "{}{}{}", prefix, branch, describe_node(node))?;

    let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
    let count = node.children().len();
    for (index, child) in node.children().iter().enumerate() {
        write_tree(f, child, &child_prefix, index + 1 == count)?;
    }
    Ok(())
}

/// One-line summary of a node: name, kind, cardinality and extras.
pub fn describe_node(node: &SchemaNode) -> String {
    let mut line = node.name().as_str().to_string();
    if node.is_dir() {
        line.push('/');
    }

    let mut traits = vec![node.kind().to_string(), node.cardinality().to_string()];
    if node.name().is_literal() {
        traits.push("literal".to_string());
    }
    if let Some(extension) = node.extension() {
        traits.push(format!(".{}", extension));
    }
    if node.allow_unknown() {
        traits.push("allow_unknown".to_string());
    }
    line.push_str(&format!(" ({})", traits.join(", ")));

    if node.semantic_name() != node.name().as_str() {
        line.push_str(&format!(" as {}", node.semantic_name()));
    }
    if let Some(validator) = node.validator_ref() {
        line.push_str(&format!(" [validator: {}]", validator));
    }
    if let Some(description) = node.description() {
        line.push_str(&format!(" - {}", description));
    }
    line
}
