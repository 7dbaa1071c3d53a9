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

//! Compiled artifact storage with name, hash, and path lookup.

use alloy_primitives::{Bytes, B256};
use catapult_common::Artifact;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::warn;

#[derive(Debug)]
enum NameEntry {
    Unique(Arc<Artifact>),
    // Two artifacts claimed the name; lookups by it are disabled.
    Ambiguous,
}

/// Artifact store, populated during project load and read-only afterwards.
///
/// When two artifacts share a `contract_name`, lookup by that name is
/// disabled for the rest of the run; hash and path lookups keep working for
/// both artifacts.
#[derive(Default, Debug)]
pub struct ContractRepository {
    by_name: HashMap<String, NameEntry>,
    by_hash: HashMap<B256, Arc<Artifact>>,
    by_path: HashMap<PathBuf, Arc<Artifact>>,
    all: Vec<Arc<Artifact>>,
}

impl ContractRepository {
    /// An empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an artifact. Returns the now-ambiguous contract name when this
    /// insert disabled name lookup, so the loader can emit the warning event.
    pub fn insert(&mut self, artifact: Artifact) -> Option<String> {
        let artifact = Arc::new(artifact);
        self.by_hash.insert(artifact.hash, Arc::clone(&artifact));
        if let Some(path) = &artifact.path {
            self.by_path.insert(path.clone(), Arc::clone(&artifact));
        }
        self.all.push(Arc::clone(&artifact));

        let name = artifact.contract_name.clone();
        match self.by_name.get(&name) {
            None => {
                self.by_name.insert(name, NameEntry::Unique(artifact));
                None
            }
            Some(NameEntry::Unique(_)) => {
                warn!(contract = %name, "duplicate artifact name, disabling name lookup");
                self.by_name.insert(name.clone(), NameEntry::Ambiguous);
                Some(name)
            }
            // Third and later duplicates stay ambiguous without re-warning.
            Some(NameEntry::Ambiguous) => None,
        }
    }

    /// Lookup by contract name; `None` when unknown or ambiguous.
    pub fn by_name(&self, name: &str) -> Option<Arc<Artifact>> {
        match self.by_name.get(name) {
            Some(NameEntry::Unique(artifact)) => Some(Arc::clone(artifact)),
            _ => None,
        }
    }

    /// Lookup by content hash.
    pub fn by_hash(&self, hash: &B256) -> Option<Arc<Artifact>> {
        self.by_hash.get(hash).cloned()
    }

    /// Lookup by the file path the artifact was loaded from.
    pub fn by_path(&self, path: &Path) -> Option<Arc<Artifact>> {
        self.by_path.get(path).cloned()
    }

    /// Find the artifact whose runtime bytecode equals `code`.
    pub fn by_deployed_code(&self, code: &Bytes) -> Option<Arc<Artifact>> {
        self.all
            .iter()
            .find(|a| a.deployed_bytecode.as_ref().is_some_and(|b| b == code))
            .cloned()
    }

    /// All artifacts, in load order.
    pub fn artifacts(&self) -> &[Arc<Artifact>] {
        &self.all
    }

    /// Number of stored artifacts.
    pub fn len(&self) -> usize {
        self.all.len()
    }

    /// Whether the repository is empty.
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::keccak256;

    fn artifact(name: &str, seed: &str) -> Artifact {
        Artifact {
            contract_name: name.to_string(),
            source_name: None,
            abi: vec![],
            bytecode: "0x6001".parse().unwrap(),
            deployed_bytecode: Some(format!("0x60{}", hex::encode(&seed.as_bytes()[..1])).parse().unwrap()),
            compiler: None,
            source: None,
            path: Some(PathBuf::from(format!("artifacts/{seed}.json"))),
            hash: keccak256(seed.as_bytes()),
        }
    }

    #[test]
    fn test_unique_name_lookup() {
        let mut repo = ContractRepository::new();
        assert!(repo.insert(artifact("Token", "a")).is_none());
        assert_eq!(repo.by_name("Token").unwrap().contract_name, "Token");
    }

    #[test]
    fn test_duplicate_name_disables_name_lookup_only() {
        let mut repo = ContractRepository::new();
        assert!(repo.insert(artifact("Token", "a")).is_none());
        assert_eq!(repo.insert(artifact("Token", "b")).as_deref(), Some("Token"));

        // Name lookup is gone, hash and path lookups survive.
        assert!(repo.by_name("Token").is_none());
        assert!(repo.by_hash(&keccak256(b"a")).is_some());
        assert!(repo.by_hash(&keccak256(b"b")).is_some());
        assert!(repo.by_path(Path::new("artifacts/a.json")).is_some());

        // A third duplicate does not re-report.
        assert!(repo.insert(artifact("Token", "c")).is_none());
        assert_eq!(repo.len(), 3);
    }

    #[test]
    fn test_deployed_code_lookup() {
        let mut repo = ContractRepository::new();
        repo.insert(artifact("Token", "a"));
        let code: Bytes = format!("0x60{}", hex::encode(b"a")).parse().unwrap();
        assert_eq!(repo.by_deployed_code(&code).unwrap().contract_name, "Token");
        assert!(repo.by_deployed_code(&"0xdead".parse().unwrap()).is_none());
    }
}
