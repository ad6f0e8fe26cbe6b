//! Budget guard: a shared, monotonically non-decreasing spend ledger.
//!
//! Capability reactions record their cost here as a side effect; the
//! orchestrator checks the ledger against the run's ceiling before
//! every round.

use std::sync::{Arc, Mutex};

use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone, Default)]
pub struct CostLedger {
    spent: Arc<Mutex<f64>>,
}

impl CostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record spend. Negative amounts are ignored; the ledger never
    /// decreases.
    pub fn add(&self, amount: f64) {
        if amount <= 0.0 {
            return;
        }
        let mut spent = self.spent.lock().unwrap_or_else(|p| p.into_inner());
        *spent += amount;
    }

    pub fn spent(&self) -> f64 {
        *self.spent.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Fails with the overage once cumulative spend exceeds `ceiling`.
    pub fn check(&self, ceiling: f64) -> Result<()> {
        let spent = self.spent();
        if spent > ceiling {
            Err(OrchestratorError::BudgetExceeded { spent, ceiling })
        } else {
            Ok(())
        }
    }
}
