/// Limits applied while importing a schema description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImporterConfig {
    /// Deepest node depth a schema may declare (Default: 64)
    pub max_schema_depth: usize,

    /// Largest schema file accepted, in bytes (Default: 10MB)
    pub max_schema_size: usize,

    /// Reject node fields the importer does not know (Default: true)
    pub deny_unknown_fields: bool,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            max_schema_depth: 64,
            max_schema_size: 10_000_000, // 10MB
            deny_unknown_fields: true,
        }
    }
}

impl ImporterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept schemas written for newer versions that carry extra fields
    pub fn permissive() -> Self {
        Self {
            deny_unknown_fields: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_schema_depth == 0 {
            return Err("max_schema_depth must be greater than 0".to_string());
        }

        if self.max_schema_size == 0 {
            return Err("max_schema_size must be greater than 0".to_string());
        }

        Ok(())
    }
}
