// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeMap;

use alloy_primitives::{Address, Selector, U256};
use proptest::prelude::*;
use rolemod_core::test_utils::{arb_condition, static_equals};
use rolemod_core::{AllowanceKey, Condition, RoleKey, normalize, unflatten};

use crate::apply::apply_instructions;
use crate::diff::{Instruction, RoleUpdate, diff_mod, plan_role_update};
use crate::permission::{FunctionRef, Permission};
use crate::types::{
    Allowance, Annotation, Clearance, ExecutionFlags, ExecutionOptions, Function, Role, RolesMod,
    Target,
};

const TRANSFER: Selector = Selector::new([0xa9, 0x05, 0x9c, 0xbb]);
const APPROVE: Selector = Selector::new([0x09, 0x5e, 0xa7, 0xb3]);

fn address(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

fn role_key(label: &str) -> RoleKey {
    label.parse().unwrap()
}

fn allowance_key(label: &str) -> AllowanceKey {
    label.parse().unwrap()
}

fn empty_mod() -> RolesMod {
    RolesMod {
        address: Address::repeat_byte(0x0f),
        owner: Address::repeat_byte(0x01),
        avatar: Address::repeat_byte(0x02),
        target: Address::repeat_byte(0x02),
        unwrap_adapters: Vec::new(),
        roles: Vec::new(),
        allowances: Vec::new(),
    }
}

fn funded_allowance(label: &str, balance: u64) -> Allowance {
    Allowance {
        refill: U256::from(100),
        max_refill: U256::from(1_000),
        period: U256::from(86_400),
        balance: U256::from(balance),
        timestamp: U256::ZERO,
        ..Allowance::cleared(allowance_key(label))
    }
}

fn scoped_function(selector: Selector, condition: Option<Condition>) -> Function {
    Function {
        selector,
        options: ExecutionOptions::None,
        wildcarded: condition.is_none(),
        condition,
    }
}

#[test]
fn set_up_role_from_scratch() {
    let update = RoleUpdate {
        key: role_key("operators"),
        members: vec![address(0xa1), address(0xa2)],
        permissions: vec![
            Permission::Function {
                address: address(0x10),
                function: FunctionRef::Signature("transfer(address to, uint amount)".to_string()),
                condition: Some(static_equals(1)),
                flags: ExecutionFlags::default(),
            },
            Permission::Target {
                address: address(0x20),
                flags: ExecutionFlags {
                    send: true,
                    delegatecall: false,
                },
            },
        ],
        annotations: vec![Annotation {
            uri: "https://example.org/permissions/swaps".to_string(),
            schema: "https://example.org/schemas/v1".to_string(),
        }],
    };

    let plan = plan_role_update(update, None).unwrap();

    let mut state = empty_mod();
    state = apply_instructions(state, &plan.instructions);

    assert_eq!(state.roles.len(), 1);
    assert_eq!(state.roles[0], plan.role);

    // Replanning against the reached state changes nothing.
    let replanned = diff_mod(
        Some(&state),
        Some(&RolesMod {
            roles: vec![plan.role],
            ..empty_mod()
        }),
    );
    assert!(replanned.is_empty());
}

#[test]
fn full_update_round_trip() {
    let prev_role = Role {
        key: role_key("operators"),
        members: vec![address(0xa1), address(0xa2), address(0xa3)],
        targets: vec![
            Target::allowed(address(0x10), ExecutionOptions::None),
            Target::scoped(
                address(0x20),
                vec![
                    scoped_function(TRANSFER, Some(normalize(static_equals(1)))),
                    scoped_function(APPROVE, None),
                ],
            ),
        ],
        annotations: vec![Annotation {
            uri: "https://example.org/a".to_string(),
            schema: "https://example.org/schemas/v1".to_string(),
        }],
        last_update: 7,
    };

    let next_role = Role {
        key: role_key("operators"),
        // 0xa1 leaves, 0xa4 joins.
        members: vec![address(0xa2), address(0xa3), address(0xa4)],
        targets: vec![
            // 0x10 is revoked, 0x20 tightens its transfer condition, approve persists.
            Target::scoped(
                address(0x20),
                vec![
                    scoped_function(TRANSFER, Some(normalize(static_equals(2)))),
                    scoped_function(APPROVE, None),
                ],
            ),
        ],
        annotations: vec![Annotation {
            uri: "https://example.org/b".to_string(),
            schema: "https://example.org/schemas/v1".to_string(),
        }],
        last_update: 7,
    };

    let prev = RolesMod {
        roles: vec![prev_role],
        allowances: vec![funded_allowance("gas", 100), funded_allowance("old", 5)],
        ..empty_mod()
    };
    let next = RolesMod {
        roles: vec![next_role],
        allowances: vec![funded_allowance("gas", 400), funded_allowance("fresh", 1)],
        ..empty_mod()
    };

    let instructions = diff_mod(Some(&prev), Some(&next));

    // Allowance writes lead the plan.
    assert!(matches!(instructions[0], Instruction::SetAllowance { .. }));
    let allowance_writes = instructions
        .iter()
        .filter(|instruction| matches!(instruction, Instruction::SetAllowance { .. }))
        .count();
    // Updated "gas", added "fresh", zeroed out "old".
    assert_eq!(allowance_writes, 3);

    let applied = apply_instructions(prev, &instructions);
    assert!(diff_mod(Some(&applied), Some(&next)).is_empty());
    assert_eq!(applied.roles, next.roles);
    assert_eq!(applied.allowances.len(), 2);
}

#[test]
fn teardown_revokes_everything() {
    let role = Role {
        key: role_key("operators"),
        members: vec![address(0xa1)],
        targets: vec![
            Target::allowed(address(0x10), ExecutionOptions::Both),
            Target::scoped(address(0x20), vec![scoped_function(TRANSFER, None)]),
        ],
        annotations: vec![Annotation {
            uri: "https://example.org/a".to_string(),
            schema: "https://example.org/schemas/v1".to_string(),
        }],
        last_update: 0,
    };
    let prev = RolesMod {
        roles: vec![role],
        allowances: vec![funded_allowance("gas", 10)],
        ..empty_mod()
    };
    let next = empty_mod();

    let instructions = diff_mod(Some(&prev), Some(&next));
    let applied = apply_instructions(prev, &instructions);

    assert!(applied.allowances.is_empty());
    assert!(applied.roles[0].members.is_empty());
    assert!(applied.roles[0].targets.is_empty());
    assert!(applied.roles[0].annotations.is_empty());
    assert!(diff_mod(Some(&applied), Some(&next)).is_empty());
}

#[test]
fn conditions_reach_the_wire_in_normal_form() {
    // Authored with redundant nesting and unsorted children.
    let authored = Condition::or(vec![
        Condition::or(vec![static_equals(3), static_equals(2)]),
        static_equals(1),
    ]);

    let update = RoleUpdate {
        key: role_key("operators"),
        members: Vec::new(),
        permissions: vec![Permission::Function {
            address: address(0x10),
            function: FunctionRef::Selector(TRANSFER),
            condition: Some(authored.clone()),
            flags: ExecutionFlags::default(),
        }],
        annotations: Vec::new(),
    };

    let plan = plan_role_update(update, None).unwrap();
    let flat = plan
        .instructions
        .iter()
        .find_map(|instruction| match instruction {
            Instruction::ScopeFunction { condition, .. } => Some(condition.clone()),
            _ => None,
        })
        .unwrap();

    assert_eq!(unflatten(&flat).unwrap(), normalize(authored));
}

#[test]
fn merged_permissions_survive_the_round_trip() {
    // Two authors grant overlapping access to the same function.
    let update = RoleUpdate {
        key: role_key("operators"),
        members: Vec::new(),
        permissions: vec![
            Permission::Function {
                address: address(0x10),
                function: FunctionRef::Signature("transfer(address,uint256)".to_string()),
                condition: Some(static_equals(1)),
                flags: ExecutionFlags {
                    send: true,
                    delegatecall: false,
                },
            },
            Permission::Function {
                address: address(0x10),
                function: FunctionRef::Selector(TRANSFER),
                condition: Some(static_equals(2)),
                flags: ExecutionFlags {
                    send: false,
                    delegatecall: true,
                },
            },
        ],
        annotations: Vec::new(),
    };

    let plan = plan_role_update(update, None).unwrap();
    assert_eq!(plan.role.targets.len(), 1);
    let function = &plan.role.targets[0].functions[0];
    assert_eq!(function.options, ExecutionOptions::Both);
    assert!(!function.wildcarded);

    let state = apply_instructions(empty_mod(), &plan.instructions);
    let reached = RolesMod {
        roles: vec![plan.role.clone()],
        ..empty_mod()
    };
    assert!(diff_mod(Some(&state), Some(&reached)).is_empty());
}

#[test]
fn state_survives_serde() {
    let state = RolesMod {
        roles: vec![Role {
            key: role_key("operators"),
            members: vec![address(0xa1)],
            targets: vec![
                Target::allowed(address(0x10), ExecutionOptions::Send),
                Target::scoped(
                    address(0x20),
                    vec![scoped_function(TRANSFER, Some(static_equals(9)))],
                ),
            ],
            annotations: vec![Annotation {
                uri: "https://example.org/a".to_string(),
                schema: "https://example.org/schemas/v1".to_string(),
            }],
            last_update: 42,
        }],
        allowances: vec![funded_allowance("gas", 77)],
        ..empty_mod()
    };

    let json = serde_json::to_string(&state).unwrap();
    let decoded: RolesMod = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, state);

    // Role keys travel as their hex encoding.
    assert!(json.contains(&role_key("operators").to_hex()));
    assert_eq!(decoded.roles[0].targets[0].clearance, Clearance::Target);
}

#[derive(Clone, Debug)]
enum TargetShape {
    Allowed(ExecutionOptions),
    Scoped(BTreeMap<u8, (Option<Condition>, ExecutionOptions)>),
}

fn arb_options() -> impl Strategy<Value = ExecutionOptions> {
    prop_oneof![
        Just(ExecutionOptions::None),
        Just(ExecutionOptions::Send),
        Just(ExecutionOptions::DelegateCall),
        Just(ExecutionOptions::Both),
    ]
}

/// Small address and selector spaces so that prev and next states overlap often.
fn arb_target_shape() -> impl Strategy<Value = TargetShape> {
    prop_oneof![
        arb_options().prop_map(TargetShape::Allowed),
        prop::collection::btree_map(
            0u8..4,
            (proptest::option::of(arb_condition()), arb_options()),
            1..3,
        )
        .prop_map(TargetShape::Scoped),
    ]
}

fn build_target(address_byte: u8, shape: TargetShape) -> Target {
    let address = Address::repeat_byte(address_byte);
    match shape {
        TargetShape::Allowed(options) => Target::allowed(address, options),
        TargetShape::Scoped(functions) => Target::scoped(
            address,
            functions
                .into_iter()
                .map(|(selector_byte, (condition, options))| Function {
                    selector: Selector::from([selector_byte, 0, 0, 0]),
                    options,
                    wildcarded: condition.is_none(),
                    condition,
                })
                .collect(),
        ),
    }
}

fn arb_role(label: &'static str) -> impl Strategy<Value = Role> {
    (
        prop::collection::btree_set(1u8..6, 0..3),
        prop::collection::btree_map(1u8..5, arb_target_shape(), 0..3),
        prop::collection::btree_map(0u8..3, 0u8..2, 0..2),
    )
        .prop_map(move |(members, targets, annotations)| Role {
            key: label.parse().unwrap(),
            members: members.into_iter().map(Address::repeat_byte).collect(),
            targets: targets
                .into_iter()
                .map(|(byte, shape)| build_target(byte, shape))
                .collect(),
            annotations: annotations
                .into_iter()
                .map(|(uri, schema)| Annotation {
                    uri: format!("https://example.org/{uri}"),
                    schema: format!("https://example.org/schemas/{schema}"),
                })
                .collect(),
            last_update: 0,
        })
}

/// Balances stay nonzero: an all-zero record denotes a cleared slot, which a fetched
/// state would report as absent rather than present.
fn arb_allowances() -> impl Strategy<Value = Vec<Allowance>> {
    prop::collection::btree_map(
        prop::sample::select(vec!["gas", "eth", "usd"]),
        (1u64..1_000, 0u64..1_000, 0u64..100_000),
        0..3,
    )
    .prop_map(|map| {
        map.into_iter()
            .map(|(label, (balance, refill, period))| Allowance {
                refill: U256::from(refill),
                max_refill: U256::from(refill),
                period: U256::from(period),
                balance: U256::from(balance),
                timestamp: U256::ZERO,
                ..Allowance::cleared(label.parse().unwrap())
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn applying_a_plan_reaches_the_planned_state(
        prev_role in arb_role("operators"),
        next_role in arb_role("operators"),
        prev_allowances in arb_allowances(),
        next_allowances in arb_allowances(),
    ) {
        let prev = RolesMod {
            roles: vec![prev_role],
            allowances: prev_allowances,
            ..empty_mod()
        };
        let next = RolesMod {
            roles: vec![next_role],
            allowances: next_allowances,
            ..empty_mod()
        };

        let instructions = diff_mod(Some(&prev), Some(&next));
        let applied = apply_instructions(prev, &instructions);

        prop_assert!(diff_mod(Some(&applied), Some(&next)).is_empty());
    }

    #[test]
    fn self_diff_is_empty(
        role in arb_role("operators"),
        allowances in arb_allowances(),
    ) {
        let state = RolesMod {
            roles: vec![role],
            allowances,
            ..empty_mod()
        };

        prop_assert!(diff_mod(Some(&state), Some(&state)).is_empty());
    }
}
