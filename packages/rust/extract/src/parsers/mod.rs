//! Parser trait, built-in parsers, and the registration table.
//!
//! A parser turns decoded command output into candidate facts. Parsers are
//! invoked in registration order; the learning pipeline isolates failures
//! per parser.

mod ip;
mod path;
mod pattern;

use std::collections::HashSet;

use factlearn_shared::{Fact, LearnError, ParsersConfig, Result};

pub use ip::IpParser;
pub use path::PathParser;
pub use pattern::PatternParser;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Lazy, finite sequence of candidate facts.
pub type FactStream<'a> = Box<dyn Iterator<Item = Fact> + 'a>;

/// Capability every parser plugin exposes.
pub trait Parser: Send + Sync {
    /// Produce zero or more facts from decoded text.
    ///
    /// Only `trait` and `value` are kept. The learning pipeline resets
    /// `score` to `[learning] initial_score` and stamps attribution itself.
    fn parse<'a>(&'a self, text: &'a str) -> Result<FactStream<'a>>;

    /// Human-readable parser name for tracing and registration.
    fn name(&self) -> &str;
}

/// Names accepted in `[parsers] enabled`.
pub const BUILTIN_PARSERS: &[&str] = &[IpParser::NAME, PathParser::NAME];

fn builtin(name: &str) -> Option<Box<dyn Parser>> {
    match name {
        IpParser::NAME => Some(Box::new(IpParser)),
        PathParser::NAME => Some(Box::new(PathParser)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds registered parsers in invocation order. Fixed after construction.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn Parser>>,
}

impl ParserRegistry {
    /// Create a registry with all built-in parsers.
    pub fn new() -> Self {
        Self {
            parsers: vec![Box::new(IpParser), Box::new(PathParser)],
        }
    }

    /// Register an explicit list of parsers. Names must be non-empty and unique.
    pub fn with_parsers(parsers: Vec<Box<dyn Parser>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for parser in &parsers {
            let name = parser.name();
            if name.trim().is_empty() {
                return Err(LearnError::config("parser registered without a name"));
            }
            if !seen.insert(name.to_string()) {
                return Err(LearnError::config(format!(
                    "parser '{name}' registered more than once"
                )));
            }
        }
        tracing::debug!(count = parsers.len(), "loaded parsers");
        Ok(Self { parsers })
    }

    /// Build the registry from the `[parsers]` config section.
    ///
    /// Unknown built-in names and broken custom parsers fail here, at load
    /// time, rather than on first use.
    pub fn from_config(config: &ParsersConfig) -> Result<Self> {
        let mut parsers: Vec<Box<dyn Parser>> = Vec::new();

        for name in &config.enabled {
            let parser = builtin(name).ok_or_else(|| {
                LearnError::config(format!(
                    "unknown parser '{name}' (available: {})",
                    BUILTIN_PARSERS.join(", ")
                ))
            })?;
            parsers.push(parser);
        }

        for custom in &config.custom {
            parsers.push(Box::new(PatternParser::from_config(custom)?));
        }

        Self::with_parsers(parsers)
    }

    /// Registered parsers, in invocation order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Parser> {
        self.parsers.iter().map(|p| p.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.parsers.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}
