/*!
 * Validation engine
 * Walks a real directory tree in lock-step with a schema tree. Every
 * directory is listed at most once, entries are claimed by schema children,
 * cardinality is checked per child and the result accumulates into a
 * ValidationReport. Filesystem failures are recorded against the subtree
 * they occurred in and never abort the run.
 */

use crate::config::{EngineConfig, OverlapPolicy};
use crate::fs::{Entry, EntryKind, EntryMetadata, FileSystem};
use crate::schema::{Cardinality, Schema, SchemaNode};
use crate::utils::PathUtils;
use crate::validation::actions::{ActionContext, ActionRegistry, ActionResult};
use crate::validation::report::{MatchResult, ValidationReport, Violation, ViolationKind};
use crate::validation::validator_registry::EntryHandle;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Partial report produced by one directory walk
#[derive(Debug, Default)]
struct Walk {
    violations: Vec<Violation>,
    matches: Vec<MatchResult>,
    action_results: Vec<ActionResult>,
    listings: usize,
    entries_visited: usize,
}

impl Walk {
    fn append(&mut self, other: Walk) {
        self.violations.extend(other.violations);
        self.matches.extend(other.matches);
        self.action_results.extend(other.action_results);
        self.listings += other.listings;
        self.entries_visited += other.entries_visited;
    }
}

/// Entries selected for each schema child of one directory
struct Claims {
    /// Indices into the sorted listing, per child in declared order
    per_child: Vec<Vec<usize>>,
    claimed: Vec<bool>,
}

pub struct ValidationEngine {
    fs: Arc<dyn FileSystem>,
    config: EngineConfig,
    actions: Option<Arc<ActionRegistry>>,
}

impl ValidationEngine {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            config: EngineConfig::default(),
            actions: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_actions(mut self, actions: Arc<ActionRegistry>) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate the tree at `root` against `schema`.
    ///
    /// The schema root's name is not matched against `root`; only its kind,
    /// validator and children apply.
    pub async fn validate(&self, schema: &Schema, root: &str) -> ValidationReport {
        let started = Instant::now();
        let root_node = schema.root();
        info!(
            "Validating {} against '{}' ({} backend, {} schema nodes)",
            root,
            root_node.semantic_name(),
            self.fs.backend_name(),
            schema.node_count()
        );

        let listing_permits = Semaphore::new(self.config.max_concurrent_walks.max(1));
        let mut walk = Walk::default();
        match self.fs.stat(root).await {
            Ok(metadata) if !metadata.exists => {
                walk.violations.push(Violation::new(
                    ViolationKind::MissingRequiredEntry,
                    root,
                    Some(root_node),
                    0,
                    format!("dataset root '{}' does not exist", root),
                ));
            }
            Ok(metadata) if !metadata.is_dir() => {
                walk.violations.push(Violation::new(
                    ViolationKind::KindMismatch,
                    root,
                    Some(root_node),
                    0,
                    format!("dataset root '{}' is a file, expected a directory", root),
                ));
            }
            Ok(metadata) => {
                let entry = Entry::new(PathUtils::base_name(root), EntryKind::Directory, root);
                let descend = self
                    .visit_entry(root_node, &entry, 0, Some(metadata), None, &mut walk)
                    .await;
                if descend && !root_node.is_leaf() {
                    let subtree = self
                        .walk_directory(root_node, root.to_string(), 0, &listing_permits)
                        .await;
                    walk.append(subtree);
                }
            }
            Err(err) => {
                warn!("Cannot stat dataset root {}: {}", root, err);
                walk.violations.push(Violation::new(
                    ViolationKind::AccessError,
                    root,
                    Some(root_node),
                    0,
                    err.to_string(),
                ));
            }
        }

        let mut report = ValidationReport {
            root: root.to_string(),
            violations: walk.violations,
            matches: walk.matches,
            action_results: walk.action_results,
            listings: walk.listings,
            entries_visited: walk.entries_visited,
        };

        if let Some(actions) = self.enabled_actions() {
            if report.is_valid() {
                let after = actions.execute_after(&report.matches);
                report.action_results.extend(after);
            } else {
                debug!("Skipping after-validation actions for invalid report");
            }
        }

        info!(
            "Validated {} in {:.2}ms: {} listings, {} entries, {} violations",
            root,
            started.elapsed().as_secs_f64() * 1000.0,
            report.listings,
            report.entries_visited,
            report.violations.len()
        );
        report
    }

    fn enabled_actions(&self) -> Option<&ActionRegistry> {
        if self.config.run_actions {
            self.actions.as_deref()
        } else {
            None
        }
    }

    /// Match the listing of `path` against the children of `node`.
    ///
    /// `depth` is the depth of the directory itself; its entries sit at
    /// `depth + 1`. `listing_permits` bounds in-flight listings across the
    /// whole run, not per level.
    fn walk_directory<'a>(
        &'a self,
        node: &'a SchemaNode,
        path: String,
        depth: usize,
        listing_permits: &'a Semaphore,
    ) -> BoxFuture<'a, Walk> {
        async move {
            let mut walk = Walk::default();
            walk.listings += 1;

            let listing = {
                // The semaphore is never closed
                let _permit = listing_permits.acquire().await.ok();
                self.fs.list_entries(&path).await
            };
            let mut entries = match listing {
                Ok(entries) => entries,
                Err(err) => {
                    warn!("Cannot list {} for '{}': {}", path, node.semantic_name(), err);
                    walk.violations.push(Violation::new(
                        ViolationKind::AccessError,
                        path.as_str(),
                        Some(node),
                        depth,
                        err.to_string(),
                    ));
                    return walk;
                }
            };
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            walk.entries_visited += entries.len();
            debug!("Listed {} entries under {}", entries.len(), path);

            let claims = self.claim(node, &entries);
            let entry_depth = depth + 1;
            let mut subtrees: Vec<(&'a SchemaNode, String)> = Vec::new();

            for (child, indices) in node.children().iter().zip(&claims.per_child) {
                let ambiguous = self.check_cardinality(child, &entries, indices, &path, entry_depth, &mut walk);
                for (position, &index) in indices.iter().enumerate() {
                    let entry = &entries[index];
                    // Surplus matches of a single-entry node are recorded but not walked
                    let surplus = position > 0 && !child.cardinality().allows_many();
                    let attached = if surplus { ambiguous.clone() } else { None };
                    let descend = self
                        .visit_entry(child, entry, entry_depth, None, attached, &mut walk)
                        .await;
                    if descend && !surplus && child.is_dir() && !child.is_leaf() {
                        subtrees.push((child, entry.path.clone()));
                    }
                }
            }

            for (entry, _) in entries
                .iter()
                .zip(&claims.claimed)
                .filter(|(_, claimed)| !**claimed)
            {
                let mut result = MatchResult::unmatched(entry.path.as_str());
                if node.allow_unknown() {
                    debug!("Ignoring unknown {} {}", entry.kind, entry.path);
                } else {
                    let reason = if entry.lossy_name {
                        format!("{} name '{}' is not valid UTF-8", entry.kind, entry.name)
                    } else {
                        format!(
                            "{} '{}' is not described by the schema under '{}'",
                            entry.kind,
                            entry.name,
                            node.semantic_name()
                        )
                    };
                    let violation = Violation::new(
                        ViolationKind::UnexpectedEntry,
                        entry.path.as_str(),
                        None,
                        entry_depth,
                        reason,
                    )
                    .with_severity(self.config.unexpected_entry_severity);
                    result.violations.push(violation.clone());
                    walk.violations.push(violation);
                }
                walk.matches.push(result);
            }

            let partials: Vec<Walk> = if self.config.parallel_subtrees && subtrees.len() > 1 {
                let walks: Vec<BoxFuture<'a, Walk>> = subtrees
                    .into_iter()
                    .map(|(child, child_path)| {
                        self.walk_directory(child, child_path, entry_depth, listing_permits)
                    })
                    .collect();
                stream::iter(walks)
                    .buffered(self.config.max_concurrent_walks.max(1))
                    .collect()
                    .await
            } else {
                let mut partials = Vec::with_capacity(subtrees.len());
                for (child, child_path) in subtrees {
                    partials.push(
                        self.walk_directory(child, child_path, entry_depth, listing_permits)
                            .await,
                    );
                }
                partials
            };
            for partial in partials {
                walk.append(partial);
            }

            walk
        }
        .boxed()
    }

    /// Assign each entry to at most one schema child.
    fn claim(&self, node: &SchemaNode, entries: &[Entry]) -> Claims {
        let children = node.children();
        let mut claims = Claims {
            per_child: vec![Vec::new(); children.len()],
            claimed: vec![false; entries.len()],
        };

        let order: Vec<usize> = match self.config.overlap_policy {
            OverlapPolicy::FirstDeclaredWins => (0..children.len()).collect(),
            OverlapPolicy::LiteralFirst => {
                let (literal, pattern): (Vec<usize>, Vec<usize>) =
                    (0..children.len()).partition(|&i| children[i].name().is_literal());
                literal.into_iter().chain(pattern).collect()
            }
        };

        for child_index in order {
            let child = &children[child_index];
            for (entry_index, entry) in entries.iter().enumerate() {
                if !claims.claimed[entry_index] && child.accepts(entry) {
                    claims.claimed[entry_index] = true;
                    claims.per_child[child_index].push(entry_index);
                }
            }
        }
        claims
    }

    /// Record cardinality violations for one schema child.
    ///
    /// Returns the ambiguity violation, if any, so surplus matches can carry it.
    fn check_cardinality(
        &self,
        child: &SchemaNode,
        entries: &[Entry],
        indices: &[usize],
        directory: &str,
        entry_depth: usize,
        walk: &mut Walk,
    ) -> Option<Violation> {
        let cardinality = child.cardinality();
        if indices.is_empty() {
            if cardinality.is_required() {
                walk.violations.push(Violation::new(
                    ViolationKind::MissingRequiredEntry,
                    directory,
                    Some(child),
                    entry_depth,
                    format!(
                        "expected {} {} matching '{}', found none",
                        cardinality,
                        child.kind(),
                        child.name().as_str()
                    ),
                ));
            }
            return None;
        }

        if cardinality.allows_many() || indices.len() == 1 {
            return None;
        }

        let names: Vec<&str> = indices.iter().map(|&i| entries[i].name.as_str()).collect();
        let violation = Violation::new(
            ViolationKind::AmbiguousMatch,
            directory,
            Some(child),
            entry_depth,
            format!(
                "expected {} {} matching '{}', found {}: {}",
                match cardinality {
                    Cardinality::ExactlyOne => "exactly one",
                    _ => "at most one",
                },
                child.kind(),
                child.name().as_str(),
                names.len(),
                names.join(", ")
            ),
        );
        walk.violations.push(violation.clone());
        Some(violation)
    }

    /// Record a matched entry, run its validator and during-validation action.
    ///
    /// `attached` is a violation already counted in `walk` that this entry's
    /// match result should also carry. Returns whether the walk may descend
    /// into the entry.
    async fn visit_entry(
        &self,
        node: &SchemaNode,
        entry: &Entry,
        depth: usize,
        known: Option<EntryMetadata>,
        attached: Option<Violation>,
        walk: &mut Walk,
    ) -> bool {
        let mut result = MatchResult::matched(entry.path.as_str(), node);
        result.violations.extend(attached);
        let mut descend = true;

        if let Some(validator) = node.validator() {
            let metadata = match known {
                Some(metadata) => Ok(metadata),
                None => self.fs.stat(&entry.path).await,
            };
            match metadata {
                Ok(metadata) => {
                    let outcome = validator.validate(&EntryHandle {
                        entry,
                        metadata: &metadata,
                        depth,
                        node: node.semantic_name(),
                    });
                    if !outcome.passed {
                        debug!("Validator failed on {}: {}", entry.path, outcome.message);
                        let violation = Violation::new(
                            ViolationKind::CustomValidationFailed,
                            entry.path.as_str(),
                            Some(node),
                            depth,
                            format!(
                                "validator '{}' failed: {}",
                                node.validator_ref().unwrap_or("custom"),
                                outcome.message
                            ),
                        );
                        result.violations.push(violation.clone());
                        walk.violations.push(violation);
                    }
                    result.validator_outcome = Some(outcome);
                }
                Err(err) => {
                    warn!("Cannot stat {}: {}", entry.path, err);
                    let violation = Violation::new(
                        ViolationKind::AccessError,
                        entry.path.as_str(),
                        Some(node),
                        depth,
                        err.to_string(),
                    );
                    result.violations.push(violation.clone());
                    walk.violations.push(violation);
                    descend = false;
                }
            }
        }

        if let Some(actions) = self.enabled_actions() {
            let context = ActionContext {
                semantic_name: node.semantic_name(),
                path: &entry.path,
                parent_path: PathUtils::parent(&entry.path),
                depth,
            };
            if let Some(action_result) = actions.execute_during(&context) {
                walk.action_results.push(action_result);
            }
        }

        walk.matches.push(result);
        descend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryObjectStore;
    use crate::validation::ValidatorOutcome;

    fn store(keys: &[&str]) -> Arc<dyn FileSystem> {
        Arc::new(MemoryObjectStore::from_keys(keys.iter().copied()))
    }

    fn schema(children: Vec<SchemaNode>) -> Schema {
        Schema::new(SchemaNode::literal_directory("root").with_children(children)).unwrap()
    }

    #[tokio::test]
    async fn test_claim_order_policies() {
        let fs = store(&["ds/readme.md", "ds/notes.md"]);
        let schema = schema(vec![
            SchemaNode::file(r".*\.md$")
                .unwrap()
                .with_cardinality(Cardinality::ZeroOrMore)
                .with_semantic_name("docs"),
            SchemaNode::literal_file("readme.md").with_semantic_name("readme"),
        ]);

        let first = ValidationEngine::new(fs.clone()).validate(&schema, "ds").await;
        assert_eq!(first.paths_for("docs"), vec!["ds/notes.md", "ds/readme.md"]);
        assert_eq!(first.count(ViolationKind::MissingRequiredEntry), 1);

        let config = EngineConfig {
            overlap_policy: OverlapPolicy::LiteralFirst,
            ..EngineConfig::default()
        };
        let literal = ValidationEngine::new(fs).with_config(config).validate(&schema, "ds").await;
        assert!(literal.is_valid(), "{}", literal);
        assert_eq!(literal.paths_for("readme"), vec!["ds/readme.md"]);
        assert_eq!(literal.paths_for("docs"), vec!["ds/notes.md"]);
    }

    #[tokio::test]
    async fn test_zero_or_one_ambiguity() {
        let fs = store(&["ds/a.cfg", "ds/b.cfg"]);
        let schema = schema(vec![SchemaNode::file(r".*\.cfg$")
            .unwrap()
            .with_cardinality(Cardinality::ZeroOrOne)]);

        let report = ValidationEngine::new(fs).validate(&schema, "ds").await;
        let ambiguous = report.violations_of(ViolationKind::AmbiguousMatch);
        assert_eq!(ambiguous.len(), 1);
        assert_eq!(ambiguous[0].path, "ds");
        assert!(ambiguous[0].reason.contains("a.cfg, b.cfg"));
        assert_eq!(report.count(ViolationKind::UnexpectedEntry), 0);

        // Both entries are reported, the surplus one carries the ambiguity
        let matched: Vec<&MatchResult> = report.matches.iter().filter(|m| m.node.is_some()).collect();
        assert_eq!(matched.len(), 2);
        assert!(matched[0].violations.is_empty());
        assert_eq!(matched[1].path, "ds/b.cfg");
        assert_eq!(matched[1].violations.len(), 1);
        assert_eq!(matched[1].violations[0].kind, ViolationKind::AmbiguousMatch);
    }

    #[tokio::test]
    async fn test_surplus_directory_is_not_walked() {
        let fs = store(&["ds/run_a/out.log", "ds/run_b/out.log", "ds/run_b/extra.bin"]);
        let schema = schema(vec![SchemaNode::directory(r"run_.*")
            .unwrap()
            .with_semantic_name("run")
            .with_child(SchemaNode::literal_file("out.log").with_semantic_name("log"))]);

        let report = ValidationEngine::new(fs).validate(&schema, "ds").await;
        assert_eq!(report.paths_for("run"), vec!["ds/run_a", "ds/run_b"]);
        assert_eq!(report.paths_for("log"), vec!["ds/run_a/out.log"]);
        assert_eq!(report.listings, 2);
        assert_eq!(report.count(ViolationKind::AmbiguousMatch), 1);
        assert_eq!(report.count(ViolationKind::UnexpectedEntry), 0);
    }

    #[tokio::test]
    async fn test_validator_sees_entry_depth() {
        let fs = store(&["ds/sub/leaf.bin"]);
        let node = SchemaNode::literal_file("leaf.bin").with_validator(
            "deep_enough",
            Arc::new(|handle: &EntryHandle<'_>| {
                if handle.depth == 2 && handle.node == "leaf.bin" {
                    ValidatorOutcome::pass()
                } else {
                    ValidatorOutcome::fail(format!("unexpected depth {}", handle.depth))
                }
            }),
        );
        let schema = schema(vec![SchemaNode::literal_directory("sub").with_child(node)]);

        let report = ValidationEngine::new(fs).validate(&schema, "ds").await;
        assert!(report.is_valid(), "{}", report);
        assert_eq!(report.listings, 2);
    }
}
