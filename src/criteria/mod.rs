//! Field predicates and the nested AND/OR criteria compiler.

pub mod compiler;
pub mod field;

pub use compiler::{Criteria, CriteriaToken};
pub use field::{Comparison, FieldCriteria};
