//! Shared material store
//!
//! Materials are resolved once per material id by a material job and shared
//! read-only with every mesh that references them. Mesh jobs may run before
//! the material they need has been parsed, so each id is first reserved
//! (a pending slot) and mesh jobs block in [`MaterialStore::wait_for`] until
//! the [`Reservation`] is resolved or failed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock};

use super::material_parser::MaterialError;
use crate::render::Material;

#[derive(Debug)]
enum SlotState {
    Pending,
    Failed(String),
}

/// Thread-safe material store keyed by material id
#[derive(Debug, Default)]
pub struct MaterialStore {
    /// Resolved materials
    materials: RwLock<HashMap<String, Arc<Material>>>,
    /// Ids reserved but not resolved, or failed
    slots: Mutex<HashMap<String, SlotState>>,
    resolved: Condvar,
}

/// Exclusive right to resolve one material id
///
/// Dropping an unresolved reservation fails the slot so waiters never hang.
#[derive(Debug)]
pub struct Reservation {
    store: Arc<MaterialStore>,
    id: String,
    settled: bool,
}

impl Reservation {
    /// Material id this reservation resolves
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Publish the material and wake every waiter
    pub fn resolve(mut self, material: Material) -> Arc<Material> {
        self.settled = true;
        self.store.settle(&self.id, Ok(material)).unwrap_or_default()
    }

    /// Record a failure and wake every waiter
    pub fn fail(mut self, reason: impl fmt::Display) {
        self.settled = true;
        self.store.settle(&self.id, Err(reason.to_string()));
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.settled {
            self.store
                .settle(&self.id, Err("material job ended without a result".to_string()));
        }
    }
}

impl MaterialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `id`
    ///
    /// Returns a [`Reservation`] when the caller is the first to ask for
    /// this id and must schedule the job that resolves it.
    pub fn reserve(self: &Arc<Self>, id: &str) -> Option<Reservation> {
        let mut slots = self.slots.lock();
        if slots.contains_key(id) || self.materials.read().contains_key(id) {
            return None;
        }
        slots.insert(id.to_string(), SlotState::Pending);
        Some(Reservation {
            store: Arc::clone(self),
            id: id.to_string(),
            settled: false,
        })
    }

    fn settle(&self, id: &str, result: Result<Material, String>) -> Option<Arc<Material>> {
        let mut slots = self.slots.lock();
        let material = match result {
            Ok(material) => {
                let material = Arc::new(material);
                self.materials
                    .write()
                    .insert(id.to_string(), Arc::clone(&material));
                slots.remove(id);
                log::debug!("Material {} resolved", id);
                Some(material)
            }
            Err(reason) => {
                log::warn!("Material {} failed: {}", id, reason);
                slots.insert(id.to_string(), SlotState::Failed(reason));
                None
            }
        };
        self.resolved.notify_all();
        material
    }

    /// Block until `id` is resolved
    ///
    /// Returns immediately for an id that is already resolved or failed.
    pub fn wait_for(&self, id: &str) -> Result<Arc<Material>, MaterialError> {
        if let Some(material) = self.get(id) {
            return Ok(material);
        }

        let mut slots = self.slots.lock();
        loop {
            if let Some(material) = self.get(id) {
                return Ok(material);
            }
            match slots.get(id) {
                Some(SlotState::Pending) => self.resolved.wait(&mut slots),
                Some(SlotState::Failed(reason)) => {
                    return Err(MaterialError::Unavailable {
                        id: id.to_string(),
                        reason: reason.clone(),
                    })
                }
                None => return Err(MaterialError::NotReserved(id.to_string())),
            }
        }
    }

    /// Resolved material for `id`, if any
    pub fn get(&self, id: &str) -> Option<Arc<Material>> {
        self.materials.read().get(id).cloned()
    }

    /// Number of resolved materials
    pub fn len(&self) -> usize {
        self.materials.read().len()
    }

    /// True when no material has been resolved
    pub fn is_empty(&self) -> bool {
        self.materials.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_reserve_once() {
        let store = Arc::new(MaterialStore::new());
        let first = store.reserve("2").unwrap();
        assert!(store.reserve("2").is_none());
        assert!(store.reserve("3").is_some());

        first.resolve(Material::empty());
        assert!(store.reserve("2").is_none());
    }

    #[test]
    fn test_resolved_material_is_shared() {
        let store = Arc::new(MaterialStore::new());
        let resolved = store.reserve("2").unwrap().resolve(Material::empty());

        let a = store.wait_for("2").unwrap();
        let b = store.get("2").unwrap();
        assert!(Arc::ptr_eq(&a, &resolved));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_waiter_blocks_until_resolved() {
        let store = Arc::new(MaterialStore::new());
        let reservation = store.reserve("7").unwrap();

        let waiter = {
            let store = Arc::clone(&store);
            thread::spawn(move || store.wait_for("7"))
        };

        thread::sleep(Duration::from_millis(20));
        reservation.resolve(Material::empty());

        assert!(waiter.join().unwrap().is_ok());
    }

    #[test]
    fn test_failed_and_unknown_materials() {
        let store = Arc::new(MaterialStore::new());
        store.reserve("bad").unwrap().fail("no definitions");

        assert!(matches!(
            store.wait_for("bad"),
            Err(MaterialError::Unavailable { reason, .. }) if reason == "no definitions"
        ));
        assert!(matches!(
            store.wait_for("never"),
            Err(MaterialError::NotReserved(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_dropped_reservation_fails_slot() {
        let store = Arc::new(MaterialStore::new());
        drop(store.reserve("lost").unwrap());

        assert!(matches!(
            store.wait_for("lost"),
            Err(MaterialError::Unavailable { .. })
        ));
    }
}
