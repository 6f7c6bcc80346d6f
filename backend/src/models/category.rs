//! Economic categories
//!
//! Each agent belongs to one category for the whole run. The category fixes
//! the agent's starting budget, i.e. how much sanction it is willing to
//! absorb when choosing a target value.

use crate::core::config::CategoryBudgets;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EconomicCategory {
    Rich,
    Medium,
    Poor,
}

impl EconomicCategory {
    /// All categories, highest budget first
    pub const ALL: [EconomicCategory; 3] = [
        EconomicCategory::Rich,
        EconomicCategory::Medium,
        EconomicCategory::Poor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EconomicCategory::Rich => "rich",
            EconomicCategory::Medium => "medium",
            EconomicCategory::Poor => "poor",
        }
    }

    pub fn budget(&self, budgets: &CategoryBudgets) -> f64 {
        budgets.get(*self)
    }
}

impl fmt::Display for EconomicCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
