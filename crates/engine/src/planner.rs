// Catapult - Declarative EVM Deployment Orchestrator
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Topological planning of jobs by their declared dependencies.
//!
//! Cycles and missing dependencies fail here, before any network work
//! begins. Among simultaneously-ready jobs the declaration order wins, so a
//! project always plans to the same order.

use catapult_common::Job;
use eyre::{bail, Result};
use itertools::Itertools;
use std::collections::{HashMap, HashSet};

/// Compute the execution order over `jobs`.
///
/// Returns indices into the input slice, topologically sorted by
/// `depends_on` with declaration order as the tie-breaker.
pub fn plan(jobs: &[Job]) -> Result<Vec<usize>> {
    let mut index_by_name: HashMap<&str, usize> = HashMap::new();
    for (index, job) in jobs.iter().enumerate() {
        if index_by_name.insert(&job.name, index).is_some() {
            bail!("duplicate job name \"{}\"", job.name);
        }
    }

    for job in jobs {
        for dependency in &job.depends_on {
            if !index_by_name.contains_key(dependency.as_str()) {
                bail!("job \"{}\" depends on unknown job \"{dependency}\"", job.name);
            }
            if dependency == &job.name {
                bail!("job \"{}\" depends on itself", job.name);
            }
        }
    }

    let mut remaining_deps: Vec<HashSet<usize>> = jobs
        .iter()
        .map(|job| job.depends_on.iter().map(|d| index_by_name[d.as_str()]).collect())
        .collect();

    let mut order = Vec::with_capacity(jobs.len());
    let mut placed = vec![false; jobs.len()];

    while order.len() < jobs.len() {
        let next = (0..jobs.len())
            .find(|&i| !placed[i] && remaining_deps[i].is_empty());
        let Some(next) = next else {
            let stuck = (0..jobs.len())
                .filter(|&i| !placed[i])
                .map(|i| jobs[i].name.as_str())
                .join(", ");
            bail!("dependency cycle among jobs: {stuck}");
        };
        placed[next] = true;
        order.push(next);
        for deps in &mut remaining_deps {
            deps.remove(&next);
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(name: &str, deps: &[&str]) -> Job {
        serde_yaml::from_str(&format!(
            "name: {name}\ndepends_on: [{}]\nactions: []\n",
            deps.join(", ")
        ))
        .unwrap()
    }

    #[test]
    fn test_dependencies_come_first() {
        let jobs = vec![job("c", &["b"]), job("a", &[]), job("b", &["a"])];
        let order = plan(&jobs).unwrap();
        let names: Vec<&str> = order.iter().map(|&i| jobs[i].name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_declaration_order_breaks_ties() {
        let jobs = vec![job("z", &[]), job("a", &[]), job("m", &["z"])];
        let order = plan(&jobs).unwrap();
        let names: Vec<&str> = order.iter().map(|&i| jobs[i].name.as_str()).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_cycle_is_fatal() {
        let jobs = vec![job("a", &["b"]), job("b", &["a"])];
        let err = plan(&jobs).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_self_dependency_is_fatal() {
        let jobs = vec![job("a", &["a"])];
        assert!(plan(&jobs).unwrap_err().to_string().contains("depends on itself"));
    }

    #[test]
    fn test_missing_dependency_is_fatal() {
        let jobs = vec![job("a", &["ghost"])];
        assert!(plan(&jobs).unwrap_err().to_string().contains("ghost"));
    }

    #[test]
    fn test_duplicate_names_are_fatal() {
        let jobs = vec![job("a", &[]), job("a", &[])];
        assert!(plan(&jobs).unwrap_err().to_string().contains("duplicate"));
    }
}
