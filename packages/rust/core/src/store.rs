//! Deduplication and scoring of facts against an operation's fact set.
//!
//! A [`FactStore`] borrows the operation mutably, so it can only exist while
//! the caller holds the operation's lock. That borrow is what keeps two
//! concurrent `learn` calls from both passing the duplicate check.

use chrono::Utc;
use factlearn_shared::{Fact, LearnError, Link, LinkId, Operation, Result};
use tracing::trace;

/// Write access to one link's facts within its operation.
pub struct FactStore<'op> {
    operation: &'op mut Operation,
    link: usize,
}

impl<'op> FactStore<'op> {
    /// Open the store for `link_id`. Fails if the link is not part of the
    /// operation's chain.
    pub fn open(operation: &'op mut Operation, link_id: &LinkId) -> Result<Self> {
        let link = operation
            .chain
            .iter()
            .position(|l| l.id == *link_id)
            .ok_or_else(|| {
                LearnError::lookup(format!(
                    "link {link_id} is not part of operation {}",
                    operation.id
                ))
            })?;
        Ok(Self { operation, link })
    }

    /// Record `fact` on the link if its trait is well formed and the
    /// operation has not seen this `(trait, value)` before. Returns whether
    /// the fact was accepted.
    pub fn save_fact(&mut self, fact: &Fact) -> bool {
        if !fact.has_valid_trait() {
            trace!(trait_name = %fact.trait_name, "rejecting fact with malformed trait");
            return false;
        }
        if self.operation.has_fact(fact) {
            trace!(trait_name = %fact.trait_name, value = %fact.value, "fact already known");
            return false;
        }

        let link = &mut self.operation.chain[self.link];
        let mut fact = fact.clone();
        fact.collected_by = Some(link.paw.clone());
        fact.technique_id = Some(link.ability.technique_id.clone());
        fact.collected_at = Some(Utc::now());
        link.facts.push(fact);
        true
    }

    /// Add `increment` to the operation's copy of every fact this link has
    /// recorded, in this pass or an earlier one. Returns how many facts were
    /// bumped.
    pub fn update_scores(&mut self, increment: i64) -> usize {
        let keys: Vec<(String, String)> = self.operation.chain[self.link]
            .facts
            .iter()
            .map(|f| (f.trait_name.clone(), f.value.clone()))
            .collect();

        let mut bumped = 0;
        for (trait_name, value) in &keys {
            if let Some(found) = self.operation.fact_mut(trait_name, value) {
                found.score += increment;
                bumped += 1;
            }
        }
        bumped
    }

    /// The link this store records facts on.
    pub fn link_mut(&mut self) -> &mut Link {
        &mut self.operation.chain[self.link]
    }

    /// The operation this store writes into.
    pub fn operation(&self) -> &Operation {
        &*self.operation
    }
}
