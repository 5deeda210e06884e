// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authoring, compiling and applying role permission updates.
//!
//! Permissions are authored as a flat list of grants, compiled into the canonical
//! target state of a role and diffed against the state currently on-chain. The diff
//! comes out as an ordered list of instructions, each corresponding to one call to the
//! roles modifier contract.

#[cfg(any(test, feature = "test_utils"))]
pub mod apply;
pub mod diff;
pub mod permission;
pub mod presets;
pub mod process;
mod signature;
#[cfg(test)]
mod tests;
pub mod types;

#[cfg(any(test, feature = "test_utils"))]
pub use apply::apply_instructions;
pub use diff::{
    Instruction, RolePlan, RoleUpdate, SetDiff, diff_allowances, diff_annotations, diff_members,
    diff_mod, diff_role, diff_targets, plan_role_update,
};
pub use permission::{FunctionRef, Permission, PermissionError};
pub use presets::{Disposition, Preset, PresetPermission, validate_presets};
pub use process::{coerce_permission, process_permissions, reconstruct_permissions};
pub use signature::{canonical_signature, selector_from_signature};
pub use types::{
    Allowance, Annotation, Clearance, ExecutionFlags, ExecutionOptions, Function, Role, RolesMod,
    Target, UnknownExecutionOptions,
};
