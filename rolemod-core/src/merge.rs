// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::condition::Condition;
use crate::normalize::normalize;

/// Union two optional conditions into one admitting everything either side admits.
///
/// `None` stands for an unconditional permission and absorbs any condition: a caller already
/// allowed to do everything gains nothing from a restriction. Two present conditions combine
/// under a logical Or and are normalized, so merging is commutative, associative and
/// idempotent up to canonical form.
pub fn merge_conditions(a: Option<Condition>, b: Option<Condition>) -> Option<Condition> {
    match (a, b) {
        (Some(a), Some(b)) => Some(normalize(Condition::or(vec![a, b]))),
        (None, _) | (_, None) => None,
    }
}
