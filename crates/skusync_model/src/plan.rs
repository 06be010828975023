//! Migration plans.

use crate::operation::{Operation, Tier};
use serde::{Deserialize, Serialize};

/// An ordered sequence of operations, consumed once by the executor.
///
/// Operations are kept in tier order: product entries precede collection
/// entries, which precede membership links. Insertion order is preserved
/// within a tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationPlan {
    operations: Vec<Operation>,
}

impl MigrationPlan {
    /// Creates an empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an operation, keeping tier order.
    pub fn push(&mut self, op: Operation) {
        let tier = op.tier();
        let at = self
            .operations
            .iter()
            .position(|existing| existing.tier() > tier)
            .unwrap_or(self.operations.len());
        self.operations.insert(at, op);
    }

    /// Appends all operations of another plan.
    pub fn extend(&mut self, ops: impl IntoIterator<Item = Operation>) {
        for op in ops {
            self.push(op);
        }
    }

    /// Returns the operations in execution order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Returns the number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true if there is nothing to execute.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns the operations of one tier.
    pub fn tier(&self, tier: Tier) -> impl Iterator<Item = &Operation> {
        self.operations.iter().filter(move |op| op.tier() == tier)
    }

    /// Splits the plan into its tiers, in execution order. Empty tiers are
    /// included so callers can rely on one entry per tier.
    pub fn into_tiers(self) -> Vec<(Tier, Vec<Operation>)> {
        let mut tiers: Vec<(Tier, Vec<Operation>)> =
            Tier::ALL.iter().map(|t| (*t, Vec::new())).collect();
        for op in self.operations {
            let slot = op.tier() as usize - 1;
            tiers[slot].1.push(op);
        }
        tiers
    }
}

impl FromIterator<Operation> for MigrationPlan {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        let mut plan = Self::new();
        plan.extend(iter);
        plan
    }
}

impl IntoIterator for MigrationPlan {
    type Item = Operation;
    type IntoIter = std::vec::IntoIter<Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.into_iter()
    }
}
