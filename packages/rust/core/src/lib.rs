//! Knowledge extraction core for factlearn.
//!
//! This crate ties the parser registry, the co-occurrence model and the
//! per-operation fact store into the `learn` workflow:
//! decode → parse → save → score → relate.

pub mod codec;
pub mod learning;
pub mod lookup;
pub mod memory;
pub mod model;
pub mod relationships;
pub mod store;

pub use learning::{LearnReport, LearningService};
pub use lookup::{OperationLookup, SharedOperation, TemplateSource, locate_one};
pub use memory::{InMemoryOperations, InMemoryTemplates};
pub use model::{CoOccurrenceModel, ModelBuilder, VariableGroup, extract_variables};
pub use store::FactStore;
