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

//! Project loading and validation.
//!
//! A project directory holds `networks.yaml`, `jobs/*.yaml`,
//! `templates/*.yaml`, and optionally `artifacts/**/*.json`. Everything is
//! loaded eagerly, validated, and frozen before execution starts.

pub mod artifacts;
pub use artifacts::*;

use crate::ContractRepository;
use catapult_common::{Action, Event, EventEmitter, EventKind, Job, Network, Template};
use eyre::{bail, eyre, Result, WrapErr};
use serde_json::json;
use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, warn};

/// A loaded, validated, immutable project.
#[derive(Debug)]
pub struct Project {
    /// Project root directory.
    pub root: PathBuf,
    /// Jobs, in file order.
    pub jobs: Vec<Job>,
    /// Templates by name.
    pub templates: HashMap<String, Template>,
    /// Declared target networks.
    pub networks: Vec<Network>,
    /// Compiled artifacts.
    pub repository: Arc<ContractRepository>,
}

impl Project {
    /// Look up a template by name.
    pub fn template(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    /// Look up a network descriptor by name.
    pub fn network(&self, name: &str) -> Option<&Network> {
        self.networks.iter().find(|n| n.name == name)
    }
}

/// Load and validate the project at `root`.
pub fn load_project(root: &Path, emitter: &EventEmitter) -> Result<Project> {
    let networks = load_networks(root)?;
    let jobs = load_jobs(root)?;
    let templates = load_templates(root)?;
    let repository = load_artifacts(root, emitter)?;

    let project = Project {
        root: root.to_path_buf(),
        jobs,
        templates,
        networks,
        repository: Arc::new(repository),
    };
    validate(&project)?;

    emitter.emit(Event::new(
        EventKind::ProjectLoaded,
        json!({
            "root": root.display().to_string(),
            "jobs": project.jobs.len(),
            "templates": project.templates.len(),
            "networks": project.networks.len(),
            "artifacts": project.repository.len(),
        }),
    ));
    Ok(project)
}

fn load_networks(root: &Path) -> Result<Vec<Network>> {
    let path = ["networks.yaml", "networks.yml"]
        .iter()
        .map(|name| root.join(name))
        .find(|p| p.is_file())
        .ok_or_else(|| eyre!("no networks.yaml found in {}", root.display()))?;
    let content = fs::read_to_string(&path)?;
    let networks: Vec<Network> = serde_yaml::from_str(&content)
        .wrap_err_with(|| format!("failed to parse {}", path.display()))?;
    let mut seen = HashSet::new();
    for network in &networks {
        if !seen.insert(network.name.as_str()) {
            bail!("duplicate network \"{}\" in {}", network.name, path.display());
        }
    }
    Ok(networks)
}

fn load_jobs(root: &Path) -> Result<Vec<Job>> {
    let mut jobs = Vec::new();
    for path in yaml_files(&root.join("jobs"))? {
        let content = fs::read_to_string(&path)?;
        let job: Job = serde_yaml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse job {}", path.display()))?;
        debug!(job = %job.name, file = %path.display(), "loaded job");
        jobs.push(job);
    }
    Ok(jobs)
}

fn load_templates(root: &Path) -> Result<HashMap<String, Template>> {
    let mut templates = HashMap::new();
    for path in yaml_files(&root.join("templates"))? {
        let content = fs::read_to_string(&path)?;
        let template: Template = serde_yaml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse template {}", path.display()))?;
        debug!(template = %template.name, file = %path.display(), "loaded template");
        if templates.insert(template.name.clone(), template).is_some() {
            bail!("duplicate template name in {}", path.display());
        }
    }
    Ok(templates)
}

fn load_artifacts(root: &Path, emitter: &EventEmitter) -> Result<ContractRepository> {
    let mut repository = ContractRepository::new();
    let parsers = default_parsers();
    for path in json_files_recursive(&root.join("artifacts"))? {
        let content = fs::read_to_string(&path)?;
        match parse_artifact(&parsers, &content, &path)
            .wrap_err_with(|| format!("failed to parse artifact {}", path.display()))?
        {
            Some(artifact) => {
                debug!(contract = %artifact.contract_name, file = %path.display(), "loaded artifact");
                if let Some(duplicate) = repository.insert(artifact) {
                    emitter.emit(Event::new(
                        EventKind::DuplicateArtifactWarning,
                        json!({"contractName": duplicate}),
                    ));
                }
            }
            None => warn!(file = %path.display(), "no artifact parser recognized file"),
        }
    }
    Ok(repository)
}

fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension().and_then(|e| e.to_str()).is_some_and(|e| e == "yaml" || e == "yml")
        })
        .collect();
    files.sort();
    Ok(files)
}

fn json_files_recursive(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.is_dir() {
        return Ok(files);
    }
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Static validation: unique names, action names unique per scope, job
/// networks exist, and templated-action `output` keys must not collide with
/// the template's own `outputs`.
fn validate(project: &Project) -> Result<()> {
    let mut job_names = HashSet::new();
    for job in &project.jobs {
        if !job_names.insert(job.name.as_str()) {
            bail!("duplicate job name \"{}\"", job.name);
        }
        if let Some(networks) = &job.networks {
            for name in networks {
                if project.network(name).is_none() {
                    bail!("job \"{}\" targets unknown network \"{name}\"", job.name);
                }
            }
        }
        validate_actions(project, &job.actions, &format!("job \"{}\"", job.name))?;
    }

    for template in project.templates.values() {
        validate_actions(
            project,
            &template.actions,
            &format!("template \"{}\"", template.name),
        )?;
        if let Some(setup) = &template.setup {
            validate_actions(
                project,
                &setup.actions,
                &format!("setup of template \"{}\"", template.name),
            )?;
        }
        for declared in &template.returns {
            if !template.outputs.contains_key(declared) {
                bail!(
                    "template \"{}\" declares return \"{declared}\" but its outputs do not bind it",
                    template.name
                );
            }
        }
    }
    Ok(())
}

fn validate_actions(project: &Project, actions: &[Action], location: &str) -> Result<()> {
    let mut names = HashSet::new();
    for action in actions {
        if let Some(name) = &action.name {
            if !names.insert(name.as_str()) {
                bail!("duplicate action name \"{name}\" in {location}");
            }
        }
        if action.output.is_some() && action.name.is_none() {
            bail!("an action of type \"{}\" in {location} declares outputs but has no name", action.kind);
        }
        // A custom output key that the invoked template also binds would be
        // stored twice; reject the ambiguity up front.
        if let (Some(output), Some(template)) =
            (&action.output, project.template(&action.kind))
        {
            for key in output.keys() {
                if template.outputs.contains_key(key) {
                    bail!(
                        "action \"{}\" in {location} binds output \"{key}\" which template \"{}\" also returns",
                        action.display_name(),
                        template.name
                    );
                }
            }
        }
    }
    Ok(())
}
