// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical form for condition trees.
//!
//! A tree's meaning is invariant under reordering or duplicating children of commutative
//! operators, under nesting And/Or inside themselves and under trailing no-op nodes in
//! dynamic-length regions. Normalization picks one representative per meaning so that
//! structural equality can stand in for semantic equality wherever trees are merged, deduped
//! or diffed.

use crate::condition::{Condition, Operator, ParamType};

/// Rewrite a condition tree into its canonical form.
///
/// Children are normalized before their parent. Pure and idempotent; never removes a node
/// that is required to reconstruct the ABI layout of the scoped value.
pub fn normalize(condition: Condition) -> Condition {
    let mut node = condition;
    node.children = node.children.into_iter().map(normalize).collect();

    let node = prune_trailing_pass(node);
    let node = flatten_nested(node);
    let node = canonicalize_children(node);
    let node = unwrap_single_child(node);
    drop_empty_comp_value(node)
}

/// Nothing in this subtree constrains the call.
fn is_unconstrained(node: &Condition) -> bool {
    node.operator == Operator::Pass && node.children.iter().all(is_unconstrained)
}

/// Drop trailing unconstrained children under a `Matches` over a dynamic-length region.
///
/// Tail arguments of calldata need no layout mirror, so these nodes carry no information.
/// Everywhere else (tuples, arrays, leading positions) Pass nodes pin the ABI layout and are
/// kept. At least one child always remains.
fn prune_trailing_pass(mut node: Condition) -> Condition {
    if node.operator != Operator::Matches {
        return node;
    }
    if !matches!(
        node.param_type,
        ParamType::Calldata | ParamType::AbiEncoded
    ) {
        return node;
    }

    while node.children.len() > 1 && node.children.last().is_some_and(is_unconstrained) {
        node.children.pop();
    }
    node
}

/// Splice children of nested And/Or nodes into their same-operator parent.
///
/// Children are already normalized, so one level of splicing is enough: a spliced grandchild
/// cannot itself carry the parent's operator.
fn flatten_nested(mut node: Condition) -> Condition {
    if !node.operator.is_associative() {
        return node;
    }

    let mut spliced = Vec::with_capacity(node.children.len());
    for child in node.children {
        if child.operator == node.operator {
            spliced.extend(child.children);
        } else {
            spliced.push(child);
        }
    }
    node.children = spliced;
    node
}

/// Sort children of commutative operators into the canonical total order and drop duplicates.
fn canonicalize_children(mut node: Condition) -> Condition {
    if !node.operator.is_commutative() {
        return node;
    }

    node.children.sort();
    node.children.dedup();
    node
}

/// Replace single-child And/Or wrappers with the child itself.
///
/// Unary Nor is negation, not a wrapper, and stays.
fn unwrap_single_child(mut node: Condition) -> Condition {
    if node.operator.is_associative() && node.children.len() == 1 {
        match node.children.pop() {
            Some(child) => child,
            None => node,
        }
    } else {
        node
    }
}

fn drop_empty_comp_value(mut node: Condition) -> Condition {
    if node.comp_value.as_ref().is_some_and(|value| value.is_empty()) {
        node.comp_value = None;
    }
    node
}
