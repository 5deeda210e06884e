// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instruction interpreter over modifier state snapshots.
//!
//! Replays planned instructions against an in-memory snapshot, mirroring the storage
//! semantics of the contract: granting overwrites, revoking deletes, an all-zero
//! allowance record clears its slot. Applying the instructions planned between two
//! states to the first yields a state whose diff against the second is empty, which
//! the test suites lean on.

use alloy_primitives::Address;
use rolemod_core::{RoleKey, unflatten};

use crate::diff::Instruction;
use crate::types::{Allowance, Clearance, ExecutionOptions, Function, Role, RolesMod, Target};

/// Replays instructions against a state snapshot and returns the resulting state.
pub fn apply_instructions(mut state: RolesMod, instructions: &[Instruction]) -> RolesMod {
    for instruction in instructions {
        apply(&mut state, instruction);
    }

    state
}

fn apply(state: &mut RolesMod, instruction: &Instruction) {
    match instruction {
        Instruction::AssignRoles {
            member,
            role_keys,
            member_of,
        } => {
            for (key, member_of) in role_keys.iter().zip(member_of) {
                let role = ensure_role(state, *key);
                if *member_of {
                    if !role.members.contains(member) {
                        role.members.push(*member);
                    }
                } else {
                    role.members.retain(|existing| existing != member);
                }
            }
        }
        Instruction::AllowTarget {
            role_key,
            address,
            options,
        } => {
            let target = ensure_target(ensure_role(state, *role_key), *address);
            target.clearance = Clearance::Target;
            target.options = *options;
            target.functions.clear();
        }
        Instruction::ScopeTarget { role_key, address } => {
            let target = ensure_target(ensure_role(state, *role_key), *address);
            // Scoping an already scoped target keeps its existing functions.
            if target.clearance != Clearance::Function {
                target.clearance = Clearance::Function;
                target.options = ExecutionOptions::None;
                target.functions.clear();
            }
        }
        Instruction::RevokeTarget { role_key, address } => {
            let role = ensure_role(state, *role_key);
            role.targets.retain(|target| target.address != *address);
        }
        Instruction::AllowFunction {
            role_key,
            address,
            selector,
            options,
        } => {
            let target = ensure_target(ensure_role(state, *role_key), *address);
            upsert_function(
                target,
                Function {
                    selector: *selector,
                    options: *options,
                    wildcarded: true,
                    condition: None,
                },
            );
        }
        Instruction::ScopeFunction {
            role_key,
            address,
            selector,
            condition,
            options,
        } => {
            let condition = unflatten(condition).expect("can rebuild flattened condition");
            let target = ensure_target(ensure_role(state, *role_key), *address);
            upsert_function(
                target,
                Function {
                    selector: *selector,
                    options: *options,
                    wildcarded: false,
                    condition: Some(condition),
                },
            );
        }
        Instruction::RevokeFunction {
            role_key,
            address,
            selector,
        } => {
            let role = ensure_role(state, *role_key);
            if let Some(target) = role
                .targets
                .iter_mut()
                .find(|target| target.address == *address)
            {
                target.functions.retain(|function| function.selector != *selector);
            }
        }
        Instruction::SetAllowance {
            key,
            balance,
            max_refill,
            refill,
            period,
            timestamp,
        } => {
            let record = Allowance {
                key: *key,
                refill: *refill,
                max_refill: *max_refill,
                period: *period,
                balance: *balance,
                timestamp: *timestamp,
            };
            if record.is_cleared() {
                state.allowances.retain(|allowance| allowance.key != *key);
            } else if let Some(existing) = state
                .allowances
                .iter_mut()
                .find(|allowance| allowance.key == *key)
            {
                *existing = record;
            } else {
                state.allowances.push(record);
            }
        }
        Instruction::PostAnnotations {
            role_key,
            add,
            remove,
        } => {
            let role = ensure_role(state, *role_key);
            role.annotations
                .retain(|annotation| !remove.contains(&annotation.uri));
            role.annotations.extend(add.iter().cloned());
        }
    }
}

fn ensure_role(state: &mut RolesMod, key: RoleKey) -> &mut Role {
    let position = match state.roles.iter().position(|role| role.key == key) {
        Some(position) => position,
        None => {
            state.roles.push(Role::new(key));
            state.roles.len() - 1
        }
    };

    &mut state.roles[position]
}

fn ensure_target(role: &mut Role, address: Address) -> &mut Target {
    let position = match role
        .targets
        .iter()
        .position(|target| target.address == address)
    {
        Some(position) => position,
        None => {
            role.targets.push(Target::scoped(address, Vec::new()));
            role.targets.len() - 1
        }
    };

    &mut role.targets[position]
}

fn upsert_function(target: &mut Target, function: Function) {
    match target
        .functions
        .iter_mut()
        .find(|existing| existing.selector == function.selector)
    {
        Some(existing) => *existing = function,
        None => target.functions.push(function),
    }
}
