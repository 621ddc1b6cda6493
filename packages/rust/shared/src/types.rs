//! Core domain types: facts, relationships, abilities, links and operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Score given to a fact that no one has scored yet.
pub const DEFAULT_FACT_SCORE: i64 = 1;

/// Label used for inferred relationships.
pub const DEFAULT_EDGE: &str = "has";

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new time-sortable identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// Identifier of an operation (UUID v7).
    OperationId
);

uuid_id!(
    /// Identifier of a single execution record (link).
    LinkId
);

// ---------------------------------------------------------------------------
// Fact
// ---------------------------------------------------------------------------

/// Stable identity of a fact, derived from its `(trait, value)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactKey(String);

impl FactKey {
    /// Derive the key for a `(trait, value)` pair.
    pub fn derive(trait_name: &str, value: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(trait_name.as_bytes());
        // unit separator keeps ("ab", "c") and ("a", "bc") apart
        hasher.update([0x1f]);
        hasher.update(value.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FactKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A typed observation collected from command output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Semantic category, e.g. `host.ip.address`.
    #[serde(rename = "trait")]
    pub trait_name: String,
    /// Observed value.
    pub value: String,
    /// Reputation score, bumped every time the fact is seen again.
    #[serde(default = "default_score")]
    pub score: i64,
    /// Agent (paw) whose execution first recorded this fact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_by: Option<String>,
    /// Technique of the ability whose output produced this fact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technique_id: Option<String>,
    /// When the fact was accepted into an operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<DateTime<Utc>>,
}

fn default_score() -> i64 {
    DEFAULT_FACT_SCORE
}

impl Fact {
    /// Create an unattributed fact with the default score.
    pub fn new(trait_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            trait_name: trait_name.into(),
            value: value.into(),
            score: DEFAULT_FACT_SCORE,
            collected_by: None,
            technique_id: None,
            collected_at: None,
        }
    }

    /// Override the starting score.
    pub fn with_score(mut self, score: i64) -> Self {
        self.score = score;
        self
    }

    /// The `(trait, value)` identity of this fact.
    pub fn unique(&self) -> FactKey {
        FactKey::derive(&self.trait_name, &self.value)
    }

    /// True when this fact has the same trait and value as `other`.
    pub fn same_as(&self, other: &Fact) -> bool {
        self.trait_name == other.trait_name && self.value == other.value
    }

    /// A trait is storable when it is non-empty and none of its dotted
    /// components are empty (`host.ip` yes, `host..ip` and `.ip` no).
    pub fn has_valid_trait(&self) -> bool {
        is_valid_trait(&self.trait_name)
    }
}

/// See [`Fact::has_valid_trait`].
pub fn is_valid_trait(trait_name: &str) -> bool {
    !trait_name.is_empty() && trait_name.split('.').all(|part| !part.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Relationship
// ---------------------------------------------------------------------------

/// Non-owning reference to a fact, by identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactRef {
    #[serde(rename = "trait")]
    pub trait_name: String,
    pub value: String,
    pub unique: FactKey,
}

impl From<&Fact> for FactRef {
    fn from(fact: &Fact) -> Self {
        Self {
            trait_name: fact.trait_name.clone(),
            value: fact.value.clone(),
            unique: fact.unique(),
        }
    }
}

/// Directed edge between two facts observed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: FactRef,
    pub edge: String,
    pub target: FactRef,
}

impl Relationship {
    pub fn new(source: &Fact, edge: impl Into<String>, target: &Fact) -> Self {
        Self {
            source: source.into(),
            edge: edge.into(),
            target: target.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ability
// ---------------------------------------------------------------------------

/// A parameterized command template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ability {
    /// Stable ability identifier.
    pub ability_id: String,
    /// ATT&CK-style technique identifier, e.g. `T1082`.
    pub technique_id: String,
    /// Base64-encoded command body with `#{variable}` placeholders. May be empty.
    #[serde(default)]
    pub test: String,
}

// ---------------------------------------------------------------------------
// Link
// ---------------------------------------------------------------------------

/// Execution record: one ability run against one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub operation_id: OperationId,
    /// Identifier of the agent that ran the command.
    pub paw: String,
    pub ability: Ability,
    /// Facts this link contributed to its operation, in acceptance order.
    #[serde(default)]
    pub facts: Vec<Fact>,
    /// Relationships inferred from this link's output.
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Link {
    pub fn new(operation_id: OperationId, paw: impl Into<String>, ability: Ability) -> Self {
        Self {
            id: LinkId::new(),
            operation_id,
            paw: paw.into(),
            ability,
            facts: Vec::new(),
            relationships: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// Aggregate owning every link run on its behalf, and through them the
/// authoritative fact collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    pub name: String,
    #[serde(default)]
    pub chain: Vec<Link>,
}

impl Operation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: OperationId::new(),
            name: name.into(),
            chain: Vec::new(),
        }
    }

    /// Append a link to the chain, re-homing it onto this operation.
    pub fn add_link(&mut self, mut link: Link) -> LinkId {
        link.operation_id = self.id;
        let id = link.id;
        self.chain.push(link);
        id
    }

    pub fn link(&self, id: &LinkId) -> Option<&Link> {
        self.chain.iter().find(|l| l.id == *id)
    }

    /// Every fact recorded by any link of this operation, in chain order.
    pub fn all_facts(&self) -> impl Iterator<Item = &Fact> {
        self.chain.iter().flat_map(|l| l.facts.iter())
    }

    /// First fact in chain order with this trait and value, i.e. the fact
    /// whose [`Fact::unique`] key matches.
    pub fn fact_mut(&mut self, trait_name: &str, value: &str) -> Option<&mut Fact> {
        self.chain
            .iter_mut()
            .flat_map(|l| l.facts.iter_mut())
            .find(|f| f.trait_name == trait_name && f.value == value)
    }

    /// True when some link already recorded a fact with this trait and value.
    pub fn has_fact(&self, fact: &Fact) -> bool {
        self.all_facts().any(|f| f.same_as(fact))
    }
}
