//! Plugin dependency resolution using topological sort.
//!
//! Ensures plugins are installed in the correct order based on their
//! manifest dependencies. Uses Kahn's algorithm with cycle detection
//! and deterministic (alphabetical) ordering of independent plugins.

use std::collections::{HashMap, HashSet, VecDeque};

use pulse_plugin_api::PluginManifest;

use super::error::PluginError;

/// Resolve plugin install order based on manifest dependencies.
///
/// Returns plugin names sorted so that dependencies come before
/// dependents; independent plugins appear alphabetically so the order
/// is stable across runs.
///
/// # Errors
/// Returns an error if a manifest declares a dependency that is not in
/// the set, or if there is a circular dependency.
///
/// # Panics
///
/// Panics if a plugin key is missing from the `in_degree` map. This
/// cannot happen because every key from `manifests` is inserted during
/// initialization before the graph-building loop.
pub fn resolve_install_order(
    manifests: &HashMap<String, PluginManifest>,
) -> Result<Vec<String>, PluginError> {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for name in manifests.keys() {
        in_degree.insert(name, 0);
        dependents.entry(name.as_str()).or_default();
    }

    for (name, manifest) in manifests {
        for dep in &manifest.dependencies {
            if !manifests.contains_key(dep) {
                return Err(PluginError::MissingDependency {
                    plugin: name.clone(),
                    dependency: dep.clone(),
                });
            }

            // Key guaranteed present: inserted in initialization loop above
            #[allow(clippy::expect_used)]
            {
                *in_degree
                    .get_mut(name.as_str())
                    .expect("plugin key missing from in_degree map") += 1;
            }
            dependents.entry(dep.as_str()).or_default().push(name);
        }
    }

    // Kahn's algorithm, seeding with zero-in-degree nodes in sorted
    // order and sorting each newly-unblocked batch.
    let mut result = Vec::with_capacity(manifests.len());
    let mut queue: VecDeque<&str> = VecDeque::new();

    let mut roots: Vec<&str> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(name, _)| *name)
        .collect();
    roots.sort_unstable();
    queue.extend(roots);

    while let Some(plugin) = queue.pop_front() {
        result.push(plugin.to_string());

        if let Some(deps) = dependents.get(plugin) {
            let mut newly_ready: Vec<&str> = Vec::new();
            for dependent in deps {
                // Key guaranteed present: inserted in initialization loop above
                #[allow(clippy::expect_used)]
                let degree = in_degree
                    .get_mut(*dependent)
                    .expect("dependent key missing from in_degree map");
                *degree -= 1;
                if *degree == 0 {
                    newly_ready.push(*dependent);
                }
            }
            newly_ready.sort_unstable();
            queue.extend(newly_ready);
        }
    }

    if result.len() != manifests.len() {
        let resolved: HashSet<_> = result.iter().map(|s| s.as_str()).collect();
        let mut in_cycle: Vec<_> = manifests
            .keys()
            .filter(|k| !resolved.contains(k.as_str()))
            .cloned()
            .collect();
        in_cycle.sort_unstable();

        return Err(PluginError::CircularDependency {
            cycle: in_cycle.join(", "),
        });
    }

    Ok(result)
}

/// Check that a plugin's dependencies are all present in `available`.
pub fn check_dependencies(
    manifest: &PluginManifest,
    available: &HashSet<String>,
) -> Result<(), PluginError> {
    for dep in &manifest.dependencies {
        if !available.contains(dep) {
            return Err(PluginError::MissingDependency {
                plugin: manifest.name.clone(),
                dependency: dep.clone(),
            });
        }
    }
    Ok(())
}
