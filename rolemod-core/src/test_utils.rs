// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixture builders and proptest strategies for condition trees.

use alloy_primitives::Bytes;
use proptest::prelude::*;

use crate::condition::{Condition, ParamType};
use crate::key::AllowanceKey;

/// 32-byte ABI word holding `value` in its last byte.
pub fn word(value: u8) -> Bytes {
    let mut bytes = vec![0; 32];
    bytes[31] = value;
    bytes.into()
}

/// Static equality leaf over a full word.
pub fn static_equals(value: u8) -> Condition {
    Condition::equal_to(ParamType::Static, word(value))
}

/// Strategy over well-formed condition trees.
///
/// Leaves are comparisons and layout nodes; inner nodes are logical connectives and
/// composite-type scopes. Everything generated passes [`Condition::validate`].
pub fn arb_condition() -> impl Strategy<Value = Condition> {
    let leaf = prop_oneof![
        (0u8..16).prop_map(static_equals),
        (0u8..16).prop_map(|value| Condition::greater_than(word(value))),
        (0u8..16).prop_map(|value| Condition::less_than(word(value))),
        Just(Condition::pass(ParamType::Static)),
        Just(Condition::pass(ParamType::Dynamic)),
        Just(Condition::equal_to_avatar()),
        prop::array::uniform32(any::<u8>())
            .prop_map(|bytes| Condition::within_allowance(AllowanceKey::from_bytes(bytes))),
    ];

    leaf.prop_recursive(3, 24, 3, |inner| {
        let children = prop::collection::vec(inner.clone(), 1..4);
        let composite = prop_oneof![
            Just(ParamType::Tuple),
            Just(ParamType::Calldata),
            Just(ParamType::AbiEncoded),
        ];

        prop_oneof![
            children.clone().prop_map(Condition::and),
            children.clone().prop_map(Condition::or),
            children.clone().prop_map(Condition::nor),
            (composite, children).prop_map(|(param_type, children)| {
                Condition::matches(param_type, children)
            }),
        ]
    })
}
