//! Pure reconciliation of the applied history with the declared migrations.
//!
//! [`merge`] produces the plan `up` executes; [`correlate`] pairs every
//! applied record with the declaration able to roll it back and detects
//! drift. Neither function touches a store.

mod correlate;
mod merge;

pub use correlate::{correlate, Correlated, Correlation, Matched};
pub use merge::{merge, PlanEntry, Target};
