//! Callbacks attached to schema nodes by semantic name.
//!
//! Actions never change the validation verdict: a failing action is recorded
//! as an [`ActionResult`], not as a violation.

use crate::error::RegistryError;
use crate::utils::PathUtils;
use crate::validation::report::MatchResult;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// When an action runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionTiming {
    /// As soon as an entry is matched to the node
    DuringValidation,

    /// Once the walk has finished, only if the report is valid
    AfterValidation,
}

/// What an action callback is told about the matched entry
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub semantic_name: &'a str,
    pub path: &'a str,
    pub parent_path: Option<&'a str>,
    pub depth: usize,
}

pub type ActionCallback = Arc<dyn Fn(&ActionContext<'_>) -> Result<(), String> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    pub path: String,
    pub action_name: String,
}

impl fmt::Display for ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "Success" } else { "Failed" };
        write!(f, "{} - {} on {}: {}", status, self.action_name, self.path, self.message)
    }
}

struct Registration {
    callback: ActionCallback,
    timing: ActionTiming,
}

#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Registration>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action for the node with the given semantic name
    pub fn register<F>(
        &mut self,
        semantic_name: impl Into<String>,
        timing: ActionTiming,
        callback: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&ActionContext<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        let name = semantic_name.into();
        if self.actions.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        debug!("Registered {:?} action for '{}'", timing, name);
        self.actions.insert(
            name,
            Registration {
                callback: Arc::new(callback),
                timing,
            },
        );
        Ok(())
    }

    pub fn timing(&self, semantic_name: &str) -> Option<ActionTiming> {
        self.actions.get(semantic_name).map(|r| r.timing)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run the during-validation action registered for `context.semantic_name`, if any
    pub fn execute_during(&self, context: &ActionContext<'_>) -> Option<ActionResult> {
        let registration = self.actions.get(context.semantic_name)?;
        if registration.timing != ActionTiming::DuringValidation {
            return None;
        }
        Some(Self::run(context, &registration.callback))
    }

    /// Run after-validation actions over every matched entry, in match order
    pub fn execute_after(&self, matches: &[MatchResult]) -> Vec<ActionResult> {
        let mut results = Vec::new();
        for matched in matches {
            let Some(node) = &matched.node else {
                continue;
            };
            let Some(registration) = self.actions.get(&node.semantic_name) else {
                continue;
            };
            if registration.timing != ActionTiming::AfterValidation {
                continue;
            }
            let context = ActionContext {
                semantic_name: &node.semantic_name,
                path: &matched.path,
                parent_path: PathUtils::parent(&matched.path),
                depth: node.depth,
            };
            results.push(Self::run(&context, &registration.callback));
        }
        results
    }

    fn run(context: &ActionContext<'_>, callback: &ActionCallback) -> ActionResult {
        match callback(context) {
            Ok(()) => ActionResult {
                success: true,
                message: "Action executed successfully".to_string(),
                path: context.path.to_string(),
                action_name: context.semantic_name.to_string(),
            },
            Err(message) => {
                warn!("Action '{}' failed on {}: {}", context.semantic_name, context.path, message);
                ActionResult {
                    success: false,
                    message: format!("Action failed: {}", message),
                    path: context.path.to_string(),
                    action_name: context.semantic_name.to_string(),
                }
            }
        }
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.actions.keys().collect();
        names.sort();
        f.debug_struct("ActionRegistry").field("actions", &names).finish()
    }
}
