//! Collaborator interfaces injected into the learning service.
//!
//! The surrounding application owns abilities and operations; the core only
//! reads abilities and locks operations through these traits.

use std::sync::Arc;

use async_trait::async_trait;
use factlearn_shared::{Ability, LearnError, Operation, OperationId, Result};
use tokio::sync::Mutex;

/// An operation shared between concurrent `learn` calls. The mutex is the
/// per-operation exclusive section around dedup and scoring.
pub type SharedOperation = Arc<Mutex<Operation>>;

/// Read-only access to every known ability.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn abilities(&self) -> Result<Vec<Ability>>;
}

/// Locate operations by identifier. Returns every match; callers decide
/// what an empty or ambiguous result means.
#[async_trait]
pub trait OperationLookup: Send + Sync {
    async fn locate(&self, id: &OperationId) -> Result<Vec<SharedOperation>>;
}

/// Resolve `id` to exactly one operation.
pub async fn locate_one(lookup: &dyn OperationLookup, id: &OperationId) -> Result<SharedOperation> {
    let mut matches = lookup.locate(id).await?;
    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => Err(LearnError::lookup(format!("operation {id} not found"))),
        n => Err(LearnError::lookup(format!(
            "operation {id} is ambiguous ({n} matches)"
        ))),
    }
}
