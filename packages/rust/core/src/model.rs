//! Co-occurrence model: which ability variables appear together.
//!
//! Every ability whose decoded body references two or more distinct
//! `#{variable}` placeholders contributes that set of names as one group.
//! Facts whose traits share a group are later related to each other.

use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock, RwLock};

use factlearn_shared::{Ability, LearnError, Result};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::codec::decode_text;
use crate::lookup::TemplateSource;

/// Matches `#{name}`; lazy and allowed to span lines.
static VARIABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)#\{(.*?)\}").expect("variable regex"));

/// Distinct variable names used together in one ability.
pub type VariableGroup = BTreeSet<String>;

/// Immutable set of variable groups, each with at least two members.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CoOccurrenceModel {
    groups: BTreeSet<VariableGroup>,
}

impl CoOccurrenceModel {
    /// Build a model from a full ability catalogue.
    ///
    /// Abilities with an empty body, or with fewer than two distinct
    /// variables, contribute nothing. A body that fails to decode fails the
    /// whole build.
    pub fn from_abilities(abilities: &[Ability]) -> Result<Self> {
        let mut groups = BTreeSet::new();

        for ability in abilities.iter().filter(|a| !a.test.trim().is_empty()) {
            let command = decode_text(&ability.test).map_err(|e| {
                LearnError::decode(format!("ability {}: {e}", ability.ability_id))
            })?;
            let variables = extract_variables(&command);
            if variables.len() > 1 {
                groups.insert(variables);
            } else {
                debug!(ability = %ability.ability_id, "ability has fewer than two variables");
            }
        }

        Ok(Self { groups })
    }

    pub fn groups(&self) -> impl Iterator<Item = &VariableGroup> {
        self.groups.iter()
    }

    /// True when some group holds exactly these names.
    pub fn contains_group<S: AsRef<str>>(&self, names: &[S]) -> bool {
        let wanted: VariableGroup = names.iter().map(|n| n.as_ref().to_string()).collect();
        self.groups.contains(&wanted)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Distinct placeholder names referenced in a command body.
pub fn extract_variables(command: &str) -> VariableGroup {
    VARIABLE_RE
        .captures_iter(command)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Owns the current model and rebuilds it from the ability catalogue.
///
/// Readers take an `Arc` snapshot; a rebuild swaps the whole model in one
/// step, so a reader sees either the old model or the new one.
pub struct ModelBuilder {
    templates: Arc<dyn TemplateSource>,
    current: RwLock<Arc<CoOccurrenceModel>>,
}

impl ModelBuilder {
    /// Start with an empty model; call [`ModelBuilder::build_model`] to fill it.
    pub fn new(templates: Arc<dyn TemplateSource>) -> Self {
        Self {
            templates,
            current: RwLock::new(Arc::new(CoOccurrenceModel::default())),
        }
    }

    /// Rebuild the model from scratch and replace the stored one.
    /// On error the previous model stays in place.
    #[instrument(skip_all)]
    pub async fn build_model(&self) -> Result<Arc<CoOccurrenceModel>> {
        let abilities = self.templates.abilities().await?;
        let model = Arc::new(CoOccurrenceModel::from_abilities(&abilities)?);

        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Arc::clone(&model);

        info!(
            abilities = abilities.len(),
            groups = model.len(),
            "co-occurrence model rebuilt"
        );
        Ok(model)
    }

    /// Snapshot of the current model.
    pub fn current(&self) -> Arc<CoOccurrenceModel> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }
}
