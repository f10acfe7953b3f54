pub mod actions;
pub mod engine;
pub mod report;
pub mod validator_registry;

pub use actions::{ActionContext, ActionRegistry, ActionResult, ActionTiming};
pub use engine::ValidationEngine;
pub use report::{MatchResult, NodeRef, Severity, ValidationReport, Violation, ViolationKind};
pub use validator_registry::{
    EntryHandle, EntryValidator, NamePatternValidator, ValidatorOutcome, ValidatorRegistry,
};
