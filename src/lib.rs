//! # treeshape
//!
//! Declarative directory-tree schemas and an async engine that checks a real
//! tree, on local disk or in an object store, against them.
//!
//! ## Features
//!
//! - **Schema Model**: typed tree of file/directory expectations with
//!   literal or prefix-anchored regex names and cardinality
//! - **Schema Import**: YAML or JSON schema files with shared definitions,
//!   includes and cycle detection
//! - **Validator Registry**: custom per-node checks resolved by name at import time
//! - **Validation Engine**: one listing per directory, claim-based matching,
//!   violations accumulated into a serializable report
//! - **Pluggable Storage**: local filesystem and in-memory object store backends
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use treeshape::{LocalFileSystem, SchemaImporter, ValidationEngine, ValidatorRegistry};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Resolve validator names against the built-ins
//!     let registry = ValidatorRegistry::with_builtins();
//!     let schema = SchemaImporter::new(&registry)
//!         .from_file("dataset.schema.yaml")
//!         .await?;
//!
//!     let engine = ValidationEngine::new(Arc::new(LocalFileSystem::new()));
//!     let report = engine.validate(&schema, "/srv/datasets/cats").await;
//!
//!     if report.is_valid() {
//!         println!("{}", report.summary());
//!     } else {
//!         for violation in &report.violations {
//!             println!("{}", violation);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod fs;
pub mod schema;
pub mod utils;
pub mod validation;

// Schema exports
pub use schema::{describe_node, Cardinality, NameMatcher, Schema, SchemaImporter, SchemaNode};

// Validation exports
pub use validation::{
    ActionContext, ActionRegistry, ActionResult, ActionTiming, EntryHandle, EntryValidator,
    MatchResult, NamePatternValidator, Severity, ValidationEngine, ValidationReport,
    ValidatorOutcome, ValidatorRegistry, Violation, ViolationKind,
};

// Filesystem exports
pub use fs::{resolve_location, Entry, EntryKind, EntryMetadata, FileSystem, LocalFileSystem, MemoryObjectStore};

// Configuration exports
pub use config::{EngineConfig, ImporterConfig, OverlapPolicy};

// Error exports
pub use error::{AccessError, RegistryError, SchemaError, SchemaErrorCode, TreeshapeError};

// Result type alias
pub use error::Result;

pub use utils::PathUtils;

/// Prelude module for convenient importing
pub mod prelude {
    pub use crate::{
        Cardinality, EngineConfig, EntryHandle, EntryKind, EntryValidator, FileSystem,
        LocalFileSystem, MemoryObjectStore, Result, Schema, SchemaImporter, SchemaNode,
        Severity, TreeshapeError, ValidationEngine, ValidationReport, ValidatorOutcome,
        ValidatorRegistry, ViolationKind,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
