//! Module dependency graph and build ordering.
//!
//! Build order is computed with Kahn's algorithm. Ties are broken by the
//! order modules are declared in configuration, so adding a module never
//! reshuffles the order of unrelated ones.

use crate::error::{PipelineError, Result};
use crate::module::{ModuleName, ModuleSpec};
use std::collections::{HashMap, HashSet, VecDeque};

/// Validated dependency graph over configured modules.
#[derive(Debug, Clone)]
pub struct ModuleGraph {
    names: Vec<ModuleName>,
    dependencies: HashMap<ModuleName, Vec<ModuleName>>,
}

impl ModuleGraph {
    /// Build a graph from module specs in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownDependency`] when a module depends on
    /// a name that is not configured. A repeated module name keeps its first
    /// declaration.
    pub fn new(specs: &[ModuleSpec]) -> Result<Self> {
        let mut names = Vec::with_capacity(specs.len());
        let mut dependencies = HashMap::with_capacity(specs.len());
        for spec in specs {
            if dependencies.contains_key(&spec.name) {
                continue;
            }
            names.push(spec.name.clone());
            dependencies.insert(spec.name.clone(), spec.depends_on.clone());
        }

        for name in &names {
            for dependency in dependencies.get(name).into_iter().flatten() {
                if !dependencies.contains_key(dependency) {
                    return Err(PipelineError::UnknownDependency {
                        module: name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        Ok(Self {
            names,
            dependencies,
        })
    }

    /// Modules in declaration order.
    #[must_use]
    pub fn modules(&self) -> &[ModuleName] {
        &self.names
    }

    /// Direct dependencies of `name`.
    #[must_use]
    pub fn dependencies_of(&self, name: &ModuleName) -> &[ModuleName] {
        self.dependencies.get(name).map_or(&[], Vec::as_slice)
    }

    /// Order in which modules must be compiled.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DependencyCycle`] naming one cycle when the
    /// graph is not acyclic.
    pub fn build_order(&self) -> Result<Vec<ModuleName>> {
        let mut remaining: HashMap<&ModuleName, usize> = self
            .names
            .iter()
            .map(|name| (name, self.distinct_dependencies(name).len()))
            .collect();
        let mut ready: VecDeque<&ModuleName> = self
            .names
            .iter()
            .filter(|name| remaining.get(name) == Some(&0))
            .collect();
        let mut order = Vec::with_capacity(self.names.len());

        while let Some(name) = ready.pop_front() {
            order.push(name.clone());
            // Visit dependants in declaration order to keep ties stable.
            for dependant in &self.names {
                if !self.distinct_dependencies(dependant).contains(name) {
                    continue;
                }
                if let Some(count) = remaining.get_mut(dependant) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.push_back(dependant);
                    }
                }
            }
        }

        if order.len() != self.names.len() {
            return Err(PipelineError::DependencyCycle {
                cycle: self.find_cycle(),
            });
        }
        Ok(order)
    }

    fn distinct_dependencies(&self, name: &ModuleName) -> HashSet<&ModuleName> {
        self.dependencies_of(name).iter().collect()
    }

    fn find_cycle(&self) -> Vec<ModuleName> {
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        for name in &self.names {
            if let Some(cycle) = self.dfs_find_cycle(name, &mut visited, &mut path) {
                return cycle;
            }
        }
        Vec::new()
    }

    fn dfs_find_cycle<'a>(
        &'a self,
        name: &'a ModuleName,
        visited: &mut HashSet<&'a ModuleName>,
        path: &mut Vec<&'a ModuleName>,
    ) -> Option<Vec<ModuleName>> {
        if let Some(start) = path.iter().position(|entry| *entry == name) {
            let mut cycle: Vec<ModuleName> =
                path.iter().skip(start).map(|entry| (*entry).clone()).collect();
            cycle.push(name.clone());
            return Some(cycle);
        }
        if !visited.insert(name) {
            return None;
        }

        path.push(name);
        for dependency in self.dependencies_of(name) {
            if let Some(cycle) = self.dfs_find_cycle(dependency, visited, path) {
                return Some(cycle);
            }
        }
        path.pop();
        None
    }
}
