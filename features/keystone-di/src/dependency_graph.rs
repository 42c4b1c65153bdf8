use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::{container::Container, metadata::Dependency, token::Token};

/// Identifies a registration as seen from a specific container
///
/// The same token can resolve to different registrations depending on where
/// resolution happens, e.g. a parent singleton does not see the shadows of a child.
type NodeKey = (u64, Token);

/// Graph of every registration visible from a container
/// Used to check for missing and circular dependencies ahead of resolution
pub struct DependencyGraph {
    map: HashMap<NodeKey, DependencyGraphEntry>,
    roots: Vec<NodeKey>,
}
impl DependencyGraph {
    pub fn new(container: &Container) -> Self {
        let mut graph = Self {
            map: HashMap::new(),
            roots: Vec::new(),
        };

        let mut visible: Vec<Token> = container.services().into_iter().collect();
        visible.sort_by_key(Token::to_string);

        let mut pending: Vec<(Container, Token)> = Vec::new();
        for token in visible {
            graph.roots.push((container.id(), token.clone()));
            pending.push((container.clone(), token));
        }

        while let Some((view, token)) = pending.pop() {
            let key = (view.id(), token.clone());
            if graph.map.contains_key(&key) {
                continue;
            }
            let Some((owner, registration)) = view.lookup(&token) else {
                continue;
            };

            // Singletons resolve their dependencies from the container owning them
            let dependency_view = if registration.caches_instances() {
                owner.clone()
            } else {
                view.clone()
            };

            let mut dependencies = Vec::new();
            for dependency in &registration.dependencies {
                let target = dependency_view
                    .lookup(&dependency.token)
                    .map(|_| (dependency_view.id(), dependency.token.clone()));
                if target.is_some() {
                    pending.push((dependency_view.clone(), dependency.token.clone()));
                }
                dependencies.push((dependency.clone(), target));
            }

            graph.map.insert(
                key,
                DependencyGraphEntry {
                    token,
                    owner: owner.name().to_string(),
                    dependencies,
                },
            );
        }

        graph
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Dependencies of `token` as resolved from the container the graph was built for
    pub fn dependencies_of(&self, token: &Token) -> Option<Vec<&Dependency>> {
        let root = self.roots.iter().find(|(_, root)| root == token)?;
        let entry = self.map.get(root)?;
        Some(entry.dependencies.iter().map(|(dependency, _)| dependency).collect())
    }

    /// Validate the graph
    ///
    /// Returns a list of all issues
    pub fn check(&self) -> Result<(), DependencyGraphErrors> {
        let mut checked = HashSet::new();
        let mut errors = Vec::new();
        for root in &self.roots {
            let Some(entry) = self.map.get(root) else {
                continue;
            };
            let mut dependency_chain = Vec::new();
            check_recurse(
                self,
                &mut checked,
                &mut errors,
                &mut dependency_chain,
                root,
                entry,
            );
        }

        if !errors.is_empty() {
            return Err(DependencyGraphErrors { errors });
        }

        return Ok(());

        fn check_recurse(
            graph: &DependencyGraph,
            checked: &mut HashSet<NodeKey>,
            errors: &mut Vec<DependencyGraphError>,
            dependency_chain: &mut Vec<NodeKey>,
            key: &NodeKey,
            entry: &DependencyGraphEntry,
        ) {
            // Circular Dependency Check
            if let Some(start) = dependency_chain.iter().position(|seen| seen == key) {
                let mut chain: Vec<Token> = dependency_chain[start..]
                    .iter()
                    .map(|(_, token)| token.clone())
                    .collect();
                chain.push(entry.token.clone());

                errors.push(DependencyGraphError::CircularDependency {
                    from: chain[0].clone(),
                    to: entry.token.clone(),
                    chain,
                });
                return;
            }

            // Skip other checks if already checked
            if !checked.insert(key.clone()) {
                return;
            };

            dependency_chain.push(key.clone());

            for (dependency, target) in &entry.dependencies {
                let Some(next_entry) = target
                    .as_ref()
                    .and_then(|target| graph.map.get(target).map(|next| (target, next)))
                else {
                    if !dependency.optional {
                        errors.push(DependencyGraphError::MissingDependency {
                            dependency: dependency.token.clone(),
                            required_by: entry.token.clone(),
                            container: entry.owner.clone(),
                        });
                    }

                    continue;
                };

                if dependency.lazy {
                    // Don't recurse, this will be checked by itself
                    continue;
                }

                let (target, next_entry) = next_entry;
                check_recurse(
                    graph,
                    checked,
                    errors,
                    dependency_chain,
                    target,
                    next_entry,
                );
            }

            dependency_chain.pop();
        }
    }
}

struct DependencyGraphEntry {
    token: Token,
    owner: String,
    dependencies: Vec<(Dependency, Option<NodeKey>)>,
}

#[derive(Error, Debug, Clone)]
pub enum DependencyGraphError {
    #[error("'{required_by}' (registered in '{container}') needs '{dependency}' but it is missing")]
    MissingDependency {
        dependency: Token,
        required_by: Token,
        container: String,
    },
    #[error("A Circular Dependency exists between '{from}' and '{to}' through {chain:?} - Consider using `Lazy`")]
    CircularDependency {
        from: Token,
        to: Token,
        chain: Vec<Token>,
    },
}
impl std::fmt::Display for DependencyGraphErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push("The dependency graph had one or more errors:".to_string());
        for error in &self.errors {
            display.push(format!("- {}", error));
        }
        f.write_str(&display.join("\n"))
    }
}

#[derive(Error, Debug, Clone)]
pub struct DependencyGraphErrors {
    pub errors: Vec<DependencyGraphError>,
}
