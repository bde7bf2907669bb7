//! Dependency update resolution.
//!
//! Two passes decide what a target repository must change:
//! 1. Non-coherency updates: dependencies named like an incoming asset move
//!    to the asset's version at the source commit.
//! 2. Coherency updates: a dependency with a coherent parent takes the
//!    version its parent's repository pins at the parent's commit.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::{Asset, CoherencyErrorDetails, DependencyDetail, DependencyUpdate, FlowError, FlowResult};
use crate::remote::RemoteFactory;

#[async_trait]
pub trait CoherencyUpdateResolver: Send + Sync {
    /// Updates driven directly by a build's assets.
    ///
    /// Assets match dependencies by name ignoring case. Dependencies with a
    /// coherent parent or pinned ones never move, and a dependency already
    /// at the asset's name, version, commit and repository is left alone.
    fn get_required_non_coherency_updates(
        &self,
        source_repo: &str,
        source_commit: &str,
        assets: &[Asset],
        dependencies: &[DependencyDetail],
    ) -> Vec<DependencyUpdate>;

    /// Updates needed to make coherent children agree with their parents.
    ///
    /// Fails with [`FlowError::Coherency`] when a parent's repository does
    /// not pin a child at all.
    async fn get_required_coherency_updates(
        &self,
        dependencies: &[DependencyDetail],
    ) -> FlowResult<Vec<DependencyUpdate>>;
}

/// Resolver walking coherency trees from their leaves to their roots and
/// reading parent pins through the remote.
pub struct StrictCoherencyUpdateResolver {
    remote_factory: Arc<dyn RemoteFactory>,
}

impl StrictCoherencyUpdateResolver {
    pub fn new(remote_factory: Arc<dyn RemoteFactory>) -> Self {
        Self { remote_factory }
    }
}

fn find_by_name<'a>(dependencies: &'a [DependencyDetail], name: &str) -> Option<&'a DependencyDetail> {
    dependencies.iter().find(|d| d.name.eq_ignore_ascii_case(name))
}

fn same_pin(a: &DependencyDetail, b: &DependencyDetail) -> bool {
    a.name == b.name && a.version == b.version && a.commit == b.commit && a.repo_uri == b.repo_uri
}

/// Dependencies with a coherent parent that no unpinned dependency names
/// as its own coherent parent.
fn leaves_of_coherency_trees(dependencies: &[DependencyDetail]) -> Vec<&DependencyDetail> {
    dependencies
        .iter()
        .filter(|d| d.has_coherent_parent())
        .filter(|leaf| {
            !dependencies.iter().any(|other| {
                !other.pinned
                    && other
                        .coherent_parent_dependency_name
                        .as_deref()
                        .is_some_and(|p| p.eq_ignore_ascii_case(&leaf.name))
            })
        })
        .collect()
}

#[async_trait]
impl CoherencyUpdateResolver for StrictCoherencyUpdateResolver {
    fn get_required_non_coherency_updates(
        &self,
        source_repo: &str,
        source_commit: &str,
        assets: &[Asset],
        dependencies: &[DependencyDetail],
    ) -> Vec<DependencyUpdate> {
        let mut updates: Vec<DependencyUpdate> = Vec::new();

        for asset in assets {
            let Some(matching) = dependencies
                .iter()
                .find(|d| d.name.eq_ignore_ascii_case(&asset.name) && !d.has_coherent_parent())
            else {
                continue;
            };

            if matching.pinned || updates.iter().any(|u| &u.from == matching) {
                continue;
            }

            if matching.name == asset.name
                && matching.version == asset.version
                && matching.commit == source_commit
                && matching.repo_uri == source_repo
            {
                continue;
            }

            let to = DependencyDetail {
                name: asset.name.clone(),
                version: asset.version.clone(),
                commit: source_commit.to_string(),
                repo_uri: source_repo.to_string(),
                ..matching.clone()
            };
            updates.push(DependencyUpdate {
                from: matching.clone(),
                to,
            });
        }

        updates
    }

    async fn get_required_coherency_updates(
        &self,
        dependencies: &[DependencyDetail],
    ) -> FlowResult<Vec<DependencyUpdate>> {
        let mut updates: Vec<DependencyUpdate> = Vec::new();
        let leaves = leaves_of_coherency_trees(dependencies);
        if leaves.is_empty() {
            return Ok(updates);
        }

        let mut errors: Vec<(String, CoherencyErrorDetails)> = Vec::new();
        let mut pins_cache: HashMap<String, Vec<DependencyDetail>> = HashMap::new();

        for leaf in leaves {
            let mut stack: Vec<&DependencyDetail> = Vec::new();
            let mut current = leaf;
            while let (Some(parent_name), false) = (
                current.coherent_parent_dependency_name.as_deref().filter(|p| !p.is_empty()),
                current.pinned,
            ) {
                stack.push(current);
                current = find_by_name(dependencies, parent_name).ok_or_else(|| {
                    FlowError::MissingCoherentParent {
                        dependency: current.name.clone(),
                        parent: parent_name.to_string(),
                    }
                })?;
            }

            while let Some(child) = stack.pop() {
                let parent_name = child.coherent_parent_dependency_name.as_deref().unwrap_or_default();
                let parent = updates
                    .iter()
                    .map(|u| &u.to)
                    .find(|to| to.name.eq_ignore_ascii_case(parent_name))
                    .or_else(|| find_by_name(dependencies, parent_name))
                    .cloned()
                    .ok_or_else(|| FlowError::MissingCoherentParent {
                        dependency: child.name.clone(),
                        parent: parent_name.to_string(),
                    })?;

                let cache_key = format!("{}@{}", parent.repo_uri, parent.commit);
                if !pins_cache.contains_key(&cache_key) {
                    let remote = self.remote_factory.create_remote(&parent.repo_uri).await?;
                    let pins = remote.get_dependencies(&parent.repo_uri, &parent.commit).await?;
                    debug!(parent = %cache_key, pins = pins.len(), "fetched coherent parent pins");
                    pins_cache.insert(cache_key.clone(), pins);
                }
                let parent_pins = pins_cache.get(&cache_key).map(Vec::as_slice).unwrap_or_default();

                let Some(pinned) = find_by_name(parent_pins, &child.name) else {
                    let error_key = format!("{}{}{}", parent.repo_uri, parent.commit, child.name);
                    if !errors.iter().any(|(k, _)| k == &error_key) {
                        errors.push((
                            error_key,
                            CoherencyErrorDetails {
                                error: format!(
                                    "{} @ {} does not contain dependency {}",
                                    parent.repo_uri, parent.commit, child.name
                                ),
                                potential_solutions: vec![
                                    format!("Add the dependency to {}.", parent.repo_uri),
                                    "Pin the dependency.".to_string(),
                                    "Remove the CoherentParentDependency attribute.".to_string(),
                                ],
                            },
                        ));
                    }
                    stack.clear();
                    continue;
                };

                if same_pin(child, pinned) {
                    continue;
                }

                info!(
                    dependency = %child.name,
                    version = %pinned.version,
                    source = %format!("{}@{}", pinned.repo_uri, pinned.commit),
                    "coherent dependency will be updated"
                );
                let to = DependencyDetail {
                    name: pinned.name.clone(),
                    version: pinned.version.clone(),
                    repo_uri: pinned.repo_uri.clone(),
                    commit: pinned.commit.clone(),
                    ..child.clone()
                };
                updates.push(DependencyUpdate {
                    from: child.clone(),
                    to,
                });
            }
        }

        if !errors.is_empty() {
            return Err(FlowError::Coherency(errors.into_iter().map(|(_, e)| e).collect()));
        }
        Ok(updates)
    }
}
