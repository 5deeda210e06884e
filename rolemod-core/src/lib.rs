// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed condition trees for role-based onchain authorization.
//!
//! A condition tree scopes what call data a permission admits, following the ABI layout of the
//! scoped function. This crate provides the tree model with the wire format's integrity rules,
//! a canonical form so that structural equality stands in for semantic equality, a logical-OR
//! merge over optional conditions, and the breadth-first parent-indexed encoding the roles
//! modifier contract stores.

pub mod condition;
pub mod flatten;
pub mod key;
pub mod merge;
pub mod normalize;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use condition::{Condition, ConditionError, Operator, ParamType};
pub use flatten::{ConditionFlat, flatten, unflatten};
pub use key::{AllowanceKey, KEY_LEN, KeyError, RoleKey};
pub use merge::merge_conditions;
pub use normalize::normalize;
