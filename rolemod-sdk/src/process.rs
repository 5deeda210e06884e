// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compilation of authored permissions into canonical target state.
//!
//! Permissions are an unordered collection and may overlap: several entries can address
//! the same target or even the same function. Compilation groups them by target address,
//! merges entries for the same function by taking the union of their execution flags and
//! the logical or of their conditions, and emits targets whose conditions are in normal
//! form. Grouping preserves first appearance order, so compiling the same permissions
//! twice yields identical output.

use alloy_primitives::{Address, Selector};
use indexmap::IndexMap;
use rolemod_core::{Condition, merge_conditions, normalize};
use tracing::debug;

use crate::permission::{FunctionRef, Permission, PermissionError};
use crate::types::{Clearance, ExecutionFlags, Function, Target};

#[derive(Default)]
struct TargetGroup {
    allowed: Option<ExecutionFlags>,
    functions: IndexMap<Selector, FunctionGroup>,
}

struct FunctionGroup {
    flags: ExecutionFlags,
    condition: Option<Condition>,
}

/// Rewrites a permission so its function reference is the derived 4-byte selector.
pub fn coerce_permission(permission: Permission) -> Result<Permission, PermissionError> {
    match permission {
        Permission::Target { .. } => Ok(permission),
        Permission::Function {
            address,
            function,
            condition,
            flags,
        } => Ok(Permission::Function {
            address,
            function: FunctionRef::Selector(function.selector()?),
            condition,
            flags,
        }),
    }
}

/// Compiles authored permissions into canonical targets.
///
/// Fails when a target is granted at address level and scoped to functions at the same
/// time, when a selector cannot be derived or when a condition is malformed.
pub fn process_permissions(permissions: &[Permission]) -> Result<Vec<Target>, PermissionError> {
    let mut groups: IndexMap<Address, TargetGroup> = IndexMap::new();

    for permission in permissions {
        let group = groups.entry(permission.address()).or_default();
        match permission {
            Permission::Target { flags, .. } => {
                group.allowed = Some(group.allowed.map_or(*flags, |previous| previous.union(*flags)));
            }
            Permission::Function {
                function,
                condition,
                flags,
                ..
            } => {
                let selector = function.selector()?;
                if let Some(condition) = condition {
                    condition.validate()?;
                }

                if let Some(merged) = group.functions.get_mut(&selector) {
                    merged.flags = merged.flags.union(*flags);
                    merged.condition = merge_conditions(merged.condition.take(), condition.clone());
                } else {
                    group.functions.insert(
                        selector,
                        FunctionGroup {
                            flags: *flags,
                            condition: condition.clone(),
                        },
                    );
                }
            }
        }
    }

    let mut targets = Vec::with_capacity(groups.len());
    for (address, group) in groups {
        match group.allowed {
            Some(_) if !group.functions.is_empty() => {
                return Err(PermissionError::DuplicateTargetKey(address));
            }
            Some(flags) => targets.push(Target::allowed(address, flags.into())),
            None => {
                let functions = group
                    .functions
                    .into_iter()
                    .map(|(selector, function)| {
                        let condition = function.condition.map(normalize);
                        Function {
                            selector,
                            options: function.flags.into(),
                            wildcarded: condition.is_none(),
                            condition,
                        }
                    })
                    .collect();
                targets.push(Target::scoped(address, functions));
            }
        }
    }

    debug!(
        "compiled {} permissions into {} targets",
        permissions.len(),
        targets.len()
    );

    Ok(targets)
}

/// Recovers the authored permissions equivalent to canonical target state.
///
/// Compiling the result reproduces the input targets exactly.
pub fn reconstruct_permissions(targets: &[Target]) -> Vec<Permission> {
    targets
        .iter()
        .flat_map(|target| match target.clearance {
            Clearance::Target => vec![Permission::Target {
                address: target.address,
                flags: target.options.into(),
            }],
            Clearance::Function => target
                .functions
                .iter()
                .map(|function| Permission::Function {
                    address: target.address,
                    function: FunctionRef::Selector(function.selector),
                    condition: if function.wildcarded {
                        None
                    } else {
                        function.condition.clone()
                    },
                    flags: function.options.into(),
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, Selector};
    use rolemod_core::test_utils::static_equals;
    use rolemod_core::{Condition, Operator, ParamType, normalize};

    use super::{coerce_permission, process_permissions, reconstruct_permissions};
    use crate::permission::{FunctionRef, Permission, PermissionError};
    use crate::types::{Clearance, ExecutionFlags, ExecutionOptions, Function, Target};

    const TRANSFER: Selector = Selector::new([0xa9, 0x05, 0x9c, 0xbb]);
    const APPROVE: Selector = Selector::new([0x09, 0x5e, 0xa7, 0xb3]);

    fn address(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn function_permission(
        address_byte: u8,
        selector: Selector,
        condition: Option<Condition>,
    ) -> Permission {
        Permission::Function {
            address: address(address_byte),
            function: FunctionRef::Selector(selector),
            condition,
            flags: ExecutionFlags::default(),
        }
    }

    #[test]
    fn groups_by_target_in_first_appearance_order() {
        let permissions = [
            function_permission(0x02, TRANSFER, None),
            Permission::Target {
                address: address(0x01),
                flags: ExecutionFlags::default(),
            },
            function_permission(0x02, APPROVE, None),
        ];

        let targets = process_permissions(&permissions).unwrap();

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].address, address(0x02));
        assert_eq!(targets[0].clearance, Clearance::Function);
        assert_eq!(
            targets[0]
                .functions
                .iter()
                .map(|function| function.selector)
                .collect::<Vec<_>>(),
            vec![TRANSFER, APPROVE]
        );
        assert_eq!(targets[1].address, address(0x01));
        assert_eq!(targets[1].clearance, Clearance::Target);
    }

    #[test]
    fn merges_conditions_of_the_same_function() {
        let permissions = [
            function_permission(0x01, TRANSFER, Some(static_equals(1))),
            function_permission(0x01, TRANSFER, Some(static_equals(2))),
        ];

        let targets = process_permissions(&permissions).unwrap();
        let function = &targets[0].functions[0];

        assert!(!function.wildcarded);
        let condition = function.condition.as_ref().unwrap();
        assert_eq!(condition.operator, Operator::Or);
        assert_eq!(condition.children.len(), 2);
    }

    #[test]
    fn unconditional_permission_absorbs_conditions() {
        let permissions = [
            function_permission(0x01, TRANSFER, Some(static_equals(1))),
            function_permission(0x01, TRANSFER, None),
        ];

        let targets = process_permissions(&permissions).unwrap();
        let function = &targets[0].functions[0];

        assert!(function.wildcarded);
        assert!(function.condition.is_none());
    }

    #[test]
    fn execution_flags_accumulate() {
        let permissions = [
            Permission::Target {
                address: address(0x01),
                flags: ExecutionFlags {
                    send: true,
                    delegatecall: false,
                },
            },
            Permission::Target {
                address: address(0x01),
                flags: ExecutionFlags {
                    send: false,
                    delegatecall: true,
                },
            },
        ];

        let targets = process_permissions(&permissions).unwrap();

        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].options, ExecutionOptions::Both);
    }

    #[test]
    fn output_conditions_are_normalized() {
        // Children arrive out of canonical order and with a duplicate.
        let condition = Condition::or(vec![
            static_equals(2),
            static_equals(1),
            static_equals(2),
        ]);
        let permissions = [function_permission(0x01, TRANSFER, Some(condition.clone()))];

        let targets = process_permissions(&permissions).unwrap();
        let compiled = targets[0].functions[0].condition.as_ref().unwrap();

        assert_eq!(compiled, &normalize(condition));
        assert_eq!(compiled.children.len(), 2);
    }

    #[test]
    fn rejects_mixed_clearance_for_one_target() {
        let permissions = [
            Permission::Target {
                address: address(0x01),
                flags: ExecutionFlags::default(),
            },
            function_permission(0x01, TRANSFER, None),
        ];

        assert_eq!(
            process_permissions(&permissions),
            Err(PermissionError::DuplicateTargetKey(address(0x01)))
        );
    }

    #[test]
    fn rejects_unresolvable_signatures() {
        let permissions = [Permission::Function {
            address: address(0x01),
            function: FunctionRef::Signature("transfer".to_string()),
            condition: None,
            flags: ExecutionFlags::default(),
        }];

        assert!(matches!(
            process_permissions(&permissions),
            Err(PermissionError::UnknownSignature(_))
        ));
    }

    #[test]
    fn rejects_malformed_conditions() {
        let condition = Condition {
            param_type: ParamType::None,
            operator: Operator::GreaterThan,
            comp_value: None,
            children: Vec::new(),
        };
        let permissions = [function_permission(0x01, TRANSFER, Some(condition))];

        assert!(matches!(
            process_permissions(&permissions),
            Err(PermissionError::MalformedCondition(_))
        ));
    }

    #[test]
    fn coerces_signatures_to_selectors() {
        let permission = Permission::Function {
            address: address(0x01),
            function: FunctionRef::Signature("transfer(address to, uint amount)".to_string()),
            condition: None,
            flags: ExecutionFlags::default(),
        };

        let coerced = coerce_permission(permission).unwrap();
        assert_eq!(
            coerced,
            Permission::Function {
                address: address(0x01),
                function: FunctionRef::Selector(TRANSFER),
                condition: None,
                flags: ExecutionFlags::default(),
            }
        );

        // Already-coerced permissions pass through unchanged.
        assert_eq!(coerce_permission(coerced.clone()).unwrap(), coerced);
    }

    #[test]
    fn reconstructed_permissions_compile_to_the_same_targets() {
        let targets = vec![
            Target::allowed(address(0x01), ExecutionOptions::Send),
            Target::scoped(
                address(0x02),
                vec![
                    Function {
                        selector: TRANSFER,
                        options: ExecutionOptions::None,
                        wildcarded: false,
                        condition: Some(normalize(static_equals(7))),
                    },
                    Function {
                        selector: APPROVE,
                        options: ExecutionOptions::DelegateCall,
                        wildcarded: true,
                        condition: None,
                    },
                ],
            ),
        ];

        let permissions = reconstruct_permissions(&targets);
        assert_eq!(permissions.len(), 3);
        assert_eq!(process_permissions(&permissions).unwrap(), targets);
    }
}
