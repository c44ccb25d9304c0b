//! Shared store of decoded fragments
//!
//! Mesh jobs insert their results concurrently; the loader takes one
//! snapshot once every job has finished. Entries are ordered by composite
//! id so the assembled buffers come out identical on every run.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::render::Mesh;

/// Thread-safe mesh store keyed by composite fragment id
#[derive(Debug, Default)]
pub struct MeshStore {
    meshes: RwLock<BTreeMap<String, Arc<Mesh>>>,
}

impl MeshStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a decoded mesh under its id, returning any mesh it replaced
    pub fn insert(&self, mesh: Mesh) -> Option<Arc<Mesh>> {
        let previous = self
            .meshes
            .write()
            .insert(mesh.id().to_string(), Arc::new(mesh));
        if let Some(previous) = &previous {
            log::warn!("Mesh {} stored twice, keeping the latest", previous.id());
        }
        previous
    }

    /// Mesh stored under `id`
    pub fn get(&self, id: &str) -> Option<Arc<Mesh>> {
        self.meshes.read().get(id).cloned()
    }

    /// True if a mesh is stored under `id`
    pub fn contains(&self, id: &str) -> bool {
        self.meshes.read().contains_key(id)
    }

    /// All meshes in composite id order
    pub fn snapshot(&self) -> Vec<Arc<Mesh>> {
        self.meshes.read().values().cloned().collect()
    }

    /// Number of stored meshes
    pub fn len(&self) -> usize {
        self.meshes.read().len()
    }

    /// True when nothing has been stored
    pub fn is_empty(&self) -> bool {
        self.meshes.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Material;

    fn mesh(id: &str) -> Mesh {
        Mesh::new(id, Vec::new(), Vec::new(), Arc::new(Material::empty()))
    }

    #[test]
    fn test_snapshot_is_ordered_by_id() {
        let store = MeshStore::new();
        store.insert(mesh("s-3-1"));
        store.insert(mesh("s-1-9"));
        store.insert(mesh("s-2-4"));

        let ids: Vec<_> = store.snapshot().iter().map(|m| m.id().to_string()).collect();
        assert_eq!(ids, vec!["s-1-9", "s-2-4", "s-3-1"]);
        assert_eq!(store.len(), 3);
        assert!(store.contains("s-2-4"));
    }

    #[test]
    fn test_insert_replaces() {
        let store = MeshStore::new();
        assert!(store.is_empty());
        assert!(store.insert(mesh("a")).is_none());
        assert!(store.insert(mesh("a")).is_some());
        assert_eq!(store.len(), 1);
        assert!(store.get("a").is_some());
    }
}
