//! In-memory program store.
//!
//! Holds the programs loaded from the runtime config, in file order, behind
//! cheap shared snapshots. The MQTT bridge reads it to advertise one trigger
//! button per program; the editor's CRUD layer (external) replaces entries
//! and rebinds the sequencer.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::model::Program;

/// Ordered, id-keyed collection of programs.
#[derive(Default)]
pub struct ProgramStore {
    programs: RwLock<Vec<Arc<Program>>>,
}

impl ProgramStore {
    /// Creates a store seeded with the given programs.
    #[must_use]
    pub fn new(programs: Vec<Program>) -> Self {
        Self {
            programs: RwLock::new(programs.into_iter().map(Arc::new).collect()),
        }
    }

    /// Returns all programs in store order.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<Program>> {
        self.programs.read().clone()
    }

    /// Looks up a program by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Program>> {
        self.programs.read().iter().find(|p| p.id == id).cloned()
    }

    /// Inserts or replaces a program, keyed by id.
    pub fn upsert(&self, program: Program) -> Arc<Program> {
        let program = Arc::new(program);
        let mut programs = self.programs.write();
        match programs.iter_mut().find(|p| p.id == program.id) {
            Some(slot) => *slot = Arc::clone(&program),
            None => programs.push(Arc::clone(&program)),
        }
        program
    }

    /// Removes a program by id; returns whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        let mut programs = self.programs.write();
        let before = programs.len();
        programs.retain(|p| p.id != id);
        programs.len() < before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(id: &str) -> Program {
        serde_json::from_str(&format!(
            r#"{{"id": "{id}", "name": "{id}", "environmentId": "e", "spm": 120, "steps": []}}"#
        ))
        .unwrap()
    }

    #[test]
    fn preserves_insertion_order() {
        let store = ProgramStore::new(vec![program("a"), program("b")]);
        store.upsert(program("c"));
        let ids: Vec<_> = store.list().iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn upsert_replaces_in_place() {
        let store = ProgramStore::new(vec![program("a"), program("b")]);
        let mut replacement = program("a");
        replacement.spm = 60;
        store.upsert(replacement);
        assert_eq!(store.get("a").unwrap().spm, 60);
        assert_eq!(store.list().len(), 2);
    }

    #[test]
    fn remove_reports_presence() {
        let store = ProgramStore::new(vec![program("a")]);
        assert!(store.remove("a"));
        assert!(!store.remove("a"));
        assert!(store.get("a").is_none());
    }
}
