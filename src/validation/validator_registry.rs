/*!
 * Validator registry
 * Maps the symbolic validator names used in schema files to implementations
 * of `EntryValidator`. The table is built explicitly at process start and is
 * read-only once an import has resolved its references against it.
 */

use crate::error::RegistryError;
use crate::fs::{Entry, EntryKind, EntryMetadata};
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Pass/fail verdict of a custom validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorOutcome {
    pub passed: bool,
    pub message: String,
}

impl ValidatorOutcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            message: String::new(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }
}

/// Everything a validator gets to look at for one matched entry
#[derive(Debug, Clone, Copy)]
pub struct EntryHandle<'a> {
    pub entry: &'a Entry,
    pub metadata: &'a EntryMetadata,

    /// Depth of the entry below the dataset root (root children are 1)
    pub depth: usize,

    /// Semantic name of the schema node the entry matched
    pub node: &'a str,
}

/// Single-method custom validation interface.
pub trait EntryValidator: Send + Sync {
    fn validate(&self, handle: &EntryHandle<'_>) -> ValidatorOutcome;
}

impl<F> EntryValidator for F
where
    F: Fn(&EntryHandle<'_>) -> ValidatorOutcome + Send + Sync,
{
    fn validate(&self, handle: &EntryHandle<'_>) -> ValidatorOutcome {
        self(handle)
    }
}

/// Accepts entries whose base name matches a regular expression.
pub struct NamePatternValidator {
    pattern: Regex,
}

impl NamePatternValidator {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }
}

impl EntryValidator for NamePatternValidator {
    fn validate(&self, handle: &EntryHandle<'_>) -> ValidatorOutcome {
        if self.pattern.is_match(&handle.entry.name) {
            ValidatorOutcome::pass()
        } else {
            ValidatorOutcome::fail(format!(
                "name '{}' does not match {}",
                handle.entry.name,
                self.pattern.as_str()
            ))
        }
    }
}

#[derive(Default, Clone)]
pub struct ValidatorRegistry {
    validators: HashMap<String, Arc<dyn EntryValidator>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in validators.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, Arc<dyn EntryValidator>); 5] = [
            ("non_empty", Arc::new(non_empty)),
            ("lowercase_name", Arc::new(lowercase_name)),
            ("no_whitespace", Arc::new(no_whitespace)),
            ("iso_date_name", Arc::new(iso_date_name)),
            ("dotted_date_name", Arc::new(dotted_date_name)),
        ];
        for (name, validator) in builtins {
            registry.validators.insert(name.to_string(), validator);
        }
        registry
    }

    /// Add a validator under `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        validator: Arc<dyn EntryValidator>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.validators.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        debug!("Registered validator '{}'", name);
        self.validators.insert(name, validator);
        Ok(())
    }

    /// Add a closure validator under `name`.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, validator: F) -> Result<(), RegistryError>
    where
        F: Fn(&EntryHandle<'_>) -> ValidatorOutcome + Send + Sync + 'static,
    {
        self.register(name, Arc::new(validator))
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn EntryValidator>, RegistryError> {
        self.validators
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownValidator(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.validators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("validators", &self.names())
            .finish()
    }
}

fn non_empty(handle: &EntryHandle<'_>) -> ValidatorOutcome {
    match handle.metadata.kind {
        Some(EntryKind::File) if handle.metadata.size == 0 => {
            ValidatorOutcome::fail(format!("file '{}' is empty", handle.entry.name))
        }
        _ => ValidatorOutcome::pass(),
    }
}

fn lowercase_name(handle: &EntryHandle<'_>) -> ValidatorOutcome {
    let name = &handle.entry.name;
    if name.chars().any(char::is_uppercase) {
        ValidatorOutcome::fail(format!("name '{}' contains uppercase characters", name))
    } else {
        ValidatorOutcome::pass()
    }
}

fn no_whitespace(handle: &EntryHandle<'_>) -> ValidatorOutcome {
    let name = &handle.entry.name;
    if name.chars().any(char::is_whitespace) {
        ValidatorOutcome::fail(format!("name '{}' contains whitespace", name))
    } else {
        ValidatorOutcome::pass()
    }
}

fn iso_date_name(handle: &EntryHandle<'_>) -> ValidatorOutcome {
    let name = &handle.entry.name;
    match date_prefix(name, [4, 2, 2], '-') {
        Some([year, month, day]) if valid_date(year, month, day) => ValidatorOutcome::pass(),
        _ => ValidatorOutcome::fail(format!("name '{}' does not start with a YYYY-MM-DD date", name)),
    }
}

fn dotted_date_name(handle: &EntryHandle<'_>) -> ValidatorOutcome {
    let name = &handle.entry.name;
    match date_prefix(name, [2, 2, 4], '.') {
        Some([day, month, year]) if valid_date(year, month, day) => ValidatorOutcome::pass(),
        _ => ValidatorOutcome::fail(format!("name '{}' does not start with a DD.MM.YYYY date", name)),
    }
}

/// Parse three separator-delimited digit groups of fixed widths at the start of `name`.
fn date_prefix(name: &str, widths: [usize; 3], separator: char) -> Option<[u32; 3]> {
    let mut values = [0u32; 3];
    let mut rest = name;
    for (index, width) in widths.iter().enumerate() {
        let digits = rest.get(..*width)?;
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        values[index] = digits.parse().ok()?;
        rest = &rest[*width..];
        if index < 2 {
            rest = rest.strip_prefix(separator)?;
        }
    }
    Some(values)
}

fn valid_date(year: u32, month: u32, day: u32) -> bool {
    year > 0 && (1..=12).contains(&month) && (1..=31).contains(&day)
}
