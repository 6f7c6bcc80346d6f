//! Norms, sanctions and the budgeted search that consumes them

pub mod institution;
pub mod search;

pub use institution::{
    enforced_norm, min_gap_baseline, Institution, NormFamily, Sanction, MPS_TO_KMH,
};
pub use search::{SearchDirection, SearchError, TargetSearch};
