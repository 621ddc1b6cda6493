//! In-memory collaborators for tests, the CLI, and embedding applications
//! that keep their state in process.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use factlearn_shared::{Ability, Operation, OperationId, Result};
use tokio::sync::Mutex;

use crate::lookup::{OperationLookup, SharedOperation, TemplateSource};

/// Ability catalogue held in memory.
#[derive(Default)]
pub struct InMemoryTemplates {
    abilities: RwLock<Vec<Ability>>,
}

impl InMemoryTemplates {
    pub fn new(abilities: Vec<Ability>) -> Self {
        Self {
            abilities: RwLock::new(abilities),
        }
    }

    pub fn add(&self, ability: Ability) {
        self.abilities
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(ability);
    }
}

#[async_trait]
impl TemplateSource for InMemoryTemplates {
    async fn abilities(&self) -> Result<Vec<Ability>> {
        Ok(self
            .abilities
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }
}

/// Operations held in memory. Duplicate ids are allowed so lookups can
/// surface ambiguity instead of silently picking one.
#[derive(Default)]
pub struct InMemoryOperations {
    operations: RwLock<Vec<(OperationId, SharedOperation)>>,
}

impl InMemoryOperations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an operation and return the shared handle to it.
    pub fn insert(&self, operation: Operation) -> SharedOperation {
        let id = operation.id;
        let shared = Arc::new(Mutex::new(operation));
        self.operations
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::clone(&shared)));
        shared
    }
}

#[async_trait]
impl OperationLookup for InMemoryOperations {
    async fn locate(&self, id: &OperationId) -> Result<Vec<SharedOperation>> {
        Ok(self
            .operations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(op_id, _)| op_id == id)
            .map(|(_, op)| Arc::clone(op))
            .collect())
    }
}
