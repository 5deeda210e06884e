// SPDX-License-Identifier: MIT OR Apache-2.0

//! Diffing of role and modifier state into executable instructions.
//!
//! Diffs compare a current state fetched from the chain against a desired state and
//! produce the minimal ordered list of contract calls taking one to the other. The
//! order is fixed: allowance writes come first so freshly scoped conditions never
//! reference a missing budget, then membership changes, then target changes with
//! revocations ahead of grants, and annotation updates last.

use alloy_primitives::{Address, Selector, U256};
use indexmap::IndexMap;
use rolemod_core::{AllowanceKey, ConditionFlat, RoleKey, flatten, normalize};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::permission::{Permission, PermissionError};
use crate::process::process_permissions;
use crate::types::{
    Allowance, Annotation, Clearance, ExecutionOptions, Function, Role, RolesMod, Target,
};

/// One call to the roles modifier contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Grant or revoke role memberships of an account.
    AssignRoles {
        member: Address,
        role_keys: Vec<RoleKey>,
        member_of: Vec<bool>,
    },

    /// Allow every call to an address.
    AllowTarget {
        role_key: RoleKey,
        address: Address,
        options: ExecutionOptions,
    },

    /// Restrict an address to its explicitly scoped functions.
    ScopeTarget { role_key: RoleKey, address: Address },

    /// Remove all access to an address.
    RevokeTarget { role_key: RoleKey, address: Address },

    /// Allow a function regardless of its arguments.
    AllowFunction {
        role_key: RoleKey,
        address: Address,
        selector: Selector,
        options: ExecutionOptions,
    },

    /// Put a function behind a condition, shipped in flattened wire encoding.
    ScopeFunction {
        role_key: RoleKey,
        address: Address,
        selector: Selector,
        condition: Vec<ConditionFlat>,
        options: ExecutionOptions,
    },

    /// Remove access to a single function.
    RevokeFunction {
        role_key: RoleKey,
        address: Address,
        selector: Selector,
    },

    /// Write an allowance record. An all-zero record clears the slot.
    SetAllowance {
        key: AllowanceKey,
        balance: U256,
        max_refill: U256,
        refill: U256,
        period: U256,
        timestamp: U256,
    },

    /// Announce annotation changes for a role.
    PostAnnotations {
        role_key: RoleKey,
        add: Vec<Annotation>,
        remove: Vec<String>,
    },
}

/// Additions and removals between two unordered collections.
///
/// Removals keep the order of the previous collection, additions the order of the next.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SetDiff<T> {
    pub minus: Vec<T>,
    pub plus: Vec<T>,
}

impl<T> SetDiff<T> {
    pub fn is_empty(&self) -> bool {
        self.minus.is_empty() && self.plus.is_empty()
    }
}

pub fn diff_members(prev: &[Address], next: &[Address]) -> SetDiff<Address> {
    SetDiff {
        minus: prev
            .iter()
            .filter(|member| !next.contains(member))
            .copied()
            .collect(),
        plus: next
            .iter()
            .filter(|member| !prev.contains(member))
            .copied()
            .collect(),
    }
}

/// Annotations are compared as a whole, so changing the schema of a uri shows up as a
/// removal of the old entry plus an addition of the new one.
pub fn diff_annotations(prev: &[Annotation], next: &[Annotation]) -> SetDiff<Annotation> {
    SetDiff {
        minus: prev
            .iter()
            .filter(|annotation| !next.contains(annotation))
            .cloned()
            .collect(),
        plus: next
            .iter()
            .filter(|annotation| !prev.contains(annotation))
            .cloned()
            .collect(),
    }
}

/// Instructions reconciling the targets of a role.
///
/// Revocations of disappeared targets come first, in previous state order. Grants and
/// updates follow in next state order. Targets present on both sides are only touched
/// where their clearance, options or conditions actually differ; conditions compare by
/// normal form, so semantically equal trees never cause churn.
pub fn diff_targets(role_key: RoleKey, prev: &[Target], next: &[Target]) -> Vec<Instruction> {
    let prev_by_address: IndexMap<Address, &Target> = prev
        .iter()
        .map(|target| (target.address, target))
        .collect();
    let next_by_address: IndexMap<Address, &Target> = next
        .iter()
        .map(|target| (target.address, target))
        .collect();

    let mut instructions = Vec::new();

    for target in prev {
        if !next_by_address.contains_key(&target.address) {
            instructions.push(Instruction::RevokeTarget {
                role_key,
                address: target.address,
            });
        }
    }

    for target in next {
        match prev_by_address.get(&target.address) {
            None => grant_target(role_key, target, &mut instructions),
            Some(existing) => update_target(role_key, existing, target, &mut instructions),
        }
    }

    instructions
}

fn grant_target(role_key: RoleKey, target: &Target, instructions: &mut Vec<Instruction>) {
    match target.clearance {
        Clearance::Target => instructions.push(Instruction::AllowTarget {
            role_key,
            address: target.address,
            options: target.options,
        }),
        Clearance::Function => {
            instructions.push(Instruction::ScopeTarget {
                role_key,
                address: target.address,
            });
            for function in &target.functions {
                instructions.push(function_grant(role_key, target.address, function));
            }
        }
    }
}

fn function_grant(role_key: RoleKey, address: Address, function: &Function) -> Instruction {
    match (&function.condition, function.wildcarded) {
        (Some(condition), false) => Instruction::ScopeFunction {
            role_key,
            address,
            selector: function.selector,
            condition: flatten(&normalize(condition.clone())),
            options: function.options,
        },
        // Without a condition to enforce, scoping degenerates to a wildcard allow.
        (None, _) | (_, true) => Instruction::AllowFunction {
            role_key,
            address,
            selector: function.selector,
            options: function.options,
        },
    }
}

fn update_target(
    role_key: RoleKey,
    prev: &Target,
    next: &Target,
    instructions: &mut Vec<Instruction>,
) {
    match (prev.clearance, next.clearance) {
        (Clearance::Target, Clearance::Target) => {
            if prev.options != next.options {
                instructions.push(Instruction::AllowTarget {
                    role_key,
                    address: next.address,
                    options: next.options,
                });
            }
        }
        // Tightening from address level to scoped functions rebuilds the whole scope.
        (Clearance::Target, Clearance::Function) => grant_target(role_key, next, instructions),
        (Clearance::Function, Clearance::Target) => {
            instructions.push(Instruction::AllowTarget {
                role_key,
                address: next.address,
                options: next.options,
            });
        }
        (Clearance::Function, Clearance::Function) => {
            diff_functions(role_key, next.address, &prev.functions, &next.functions, instructions);
        }
    }
}

fn diff_functions(
    role_key: RoleKey,
    address: Address,
    prev: &[Function],
    next: &[Function],
    instructions: &mut Vec<Instruction>,
) {
    let prev_by_selector: IndexMap<Selector, &Function> = prev
        .iter()
        .map(|function| (function.selector, function))
        .collect();
    let next_by_selector: IndexMap<Selector, &Function> = next
        .iter()
        .map(|function| (function.selector, function))
        .collect();

    for function in prev {
        if !next_by_selector.contains_key(&function.selector) {
            instructions.push(Instruction::RevokeFunction {
                role_key,
                address,
                selector: function.selector,
            });
        }
    }

    for function in next {
        let changed = match prev_by_selector.get(&function.selector) {
            Some(existing) => function_changed(existing, function),
            None => true,
        };
        if changed {
            instructions.push(function_grant(role_key, address, function));
        }
    }
}

fn function_changed(prev: &Function, next: &Function) -> bool {
    if prev.options != next.options || prev.wildcarded != next.wildcarded {
        return true;
    }

    // Conditions compare in normal form, raw trees may differ without meaning to.
    prev.condition.clone().map(normalize) != next.condition.clone().map(normalize)
}

/// Instructions reconciling the shared allowances of a modifier.
///
/// The wire has no unset call, so removed allowances are overwritten with an all-zero
/// record. The `timestamp` field moves on its own as the contract refills balances and
/// is never treated as a change by itself.
pub fn diff_allowances(prev: &[Allowance], next: &[Allowance]) -> Vec<Instruction> {
    let prev_by_key: IndexMap<AllowanceKey, &Allowance> = prev
        .iter()
        .map(|allowance| (allowance.key, allowance))
        .collect();
    let next_by_key: IndexMap<AllowanceKey, &Allowance> = next
        .iter()
        .map(|allowance| (allowance.key, allowance))
        .collect();

    let mut instructions = Vec::new();

    for allowance in next {
        let changed = match prev_by_key.get(&allowance.key) {
            Some(existing) => allowance_changed(existing, allowance),
            None => true,
        };
        if changed {
            instructions.push(set_allowance(allowance));
        }
    }

    for allowance in prev {
        if !next_by_key.contains_key(&allowance.key) {
            instructions.push(set_allowance(&Allowance::cleared(allowance.key)));
        }
    }

    instructions
}

fn allowance_changed(prev: &Allowance, next: &Allowance) -> bool {
    prev.balance != next.balance
        || prev.max_refill != next.max_refill
        || prev.refill != next.refill
        || prev.period != next.period
}

fn set_allowance(allowance: &Allowance) -> Instruction {
    Instruction::SetAllowance {
        key: allowance.key,
        balance: allowance.balance,
        max_refill: allowance.max_refill,
        refill: allowance.refill,
        period: allowance.period,
        timestamp: allowance.timestamp,
    }
}

/// Instructions taking one role state to another.
///
/// Passing `None` on one side diffs against an empty role: `diff_role(None, Some(role))`
/// sets a role up from scratch, `diff_role(Some(role), None)` tears it down. When both
/// sides are present they must describe the role with the same key.
pub fn diff_role(prev: Option<&Role>, next: Option<&Role>) -> Vec<Instruction> {
    let Some(key) = next.or(prev).map(|role| role.key) else {
        return Vec::new();
    };

    let prev_members = prev.map_or(&[][..], |role| &role.members);
    let next_members = next.map_or(&[][..], |role| &role.members);
    let prev_targets = prev.map_or(&[][..], |role| &role.targets);
    let next_targets = next.map_or(&[][..], |role| &role.targets);
    let prev_annotations = prev.map_or(&[][..], |role| &role.annotations);
    let next_annotations = next.map_or(&[][..], |role| &role.annotations);

    let mut instructions = Vec::new();

    let members = diff_members(prev_members, next_members);
    for member in members.minus {
        instructions.push(Instruction::AssignRoles {
            member,
            role_keys: vec![key],
            member_of: vec![false],
        });
    }
    for member in members.plus {
        instructions.push(Instruction::AssignRoles {
            member,
            role_keys: vec![key],
            member_of: vec![true],
        });
    }

    instructions.extend(diff_targets(key, prev_targets, next_targets));

    let annotations = diff_annotations(prev_annotations, next_annotations);
    if !annotations.is_empty() {
        instructions.push(Instruction::PostAnnotations {
            role_key: key,
            add: annotations.plus,
            remove: annotations
                .minus
                .into_iter()
                .map(|annotation| annotation.uri)
                .collect(),
        });
    }

    debug!("planned {} instructions for role {}", instructions.len(), key);

    instructions
}

/// Instructions taking one modifier state to another, allowances first.
pub fn diff_mod(prev: Option<&RolesMod>, next: Option<&RolesMod>) -> Vec<Instruction> {
    let prev_allowances = prev.map_or(&[][..], |state| &state.allowances);
    let next_allowances = next.map_or(&[][..], |state| &state.allowances);
    let prev_roles = prev.map_or(&[][..], |state| &state.roles);
    let next_roles = next.map_or(&[][..], |state| &state.roles);

    let mut instructions = diff_allowances(prev_allowances, next_allowances);

    for role in next_roles {
        let existing = prev_roles.iter().find(|candidate| candidate.key == role.key);
        instructions.extend(diff_role(existing, Some(role)));
    }
    for role in prev_roles {
        if next_roles.iter().all(|candidate| candidate.key != role.key) {
            instructions.extend(diff_role(Some(role), None));
        }
    }

    instructions
}

/// Desired state of a single role, authored as members and permissions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleUpdate {
    pub key: RoleKey,

    pub members: Vec<Address>,

    pub permissions: Vec<Permission>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

/// A compiled role update: the canonical role state plus the instructions reaching it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RolePlan {
    pub role: Role,
    pub instructions: Vec<Instruction>,
}

/// Compiles an authored update into canonical role state and plans the instructions
/// taking `prev` there.
pub fn plan_role_update(update: RoleUpdate, prev: Option<&Role>) -> Result<RolePlan, PermissionError> {
    let targets = process_permissions(&update.permissions)?;
    let role = Role {
        key: update.key,
        members: update.members,
        targets,
        annotations: update.annotations,
        last_update: prev.map_or(0, |role| role.last_update),
    };
    let instructions = diff_role(prev, Some(&role));

    Ok(RolePlan { role, instructions })
}
