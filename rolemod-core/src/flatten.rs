// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::VecDeque;

use alloy_primitives::Bytes;
use serde::{Deserialize, Serialize};

use crate::condition::{Condition, ConditionError, Operator, ParamType};

/// One node of a condition tree in the parent-indexed wire encoding.
///
/// The roles modifier stores condition trees as a breadth-first array of these records. The
/// root sits at index 0 and references itself; every other record references a parent at a
/// smaller index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionFlat {
    pub parent: usize,
    pub param_type: ParamType,
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comp_value: Option<Bytes>,
}

/// Encode a condition tree as its breadth-first, parent-indexed record array.
///
/// Deterministic: structurally equal trees produce identical arrays, byte for byte.
pub fn flatten(root: &Condition) -> Vec<ConditionFlat> {
    let mut records = Vec::new();
    let mut queue = VecDeque::from([(root, 0)]);

    while let Some((node, parent)) = queue.pop_front() {
        let index = records.len();
        records.push(ConditionFlat {
            parent,
            param_type: node.param_type,
            operator: node.operator,
            comp_value: node.comp_value.clone(),
        });

        for child in &node.children {
            queue.push_back((child, index));
        }
    }

    records
}

/// Rebuild a condition tree from its flat encoding.
///
/// Relies on the breadth-first invariant that parents precede their children; a record
/// referencing itself or a later index (other than the self-referencing root) is rejected.
pub fn unflatten(records: &[ConditionFlat]) -> Result<Condition, ConditionError> {
    let Some(root) = records.first() else {
        return Err(ConditionError::EmptyEncoding);
    };
    if root.parent != 0 {
        return Err(ConditionError::DanglingParent(0, root.parent));
    }

    let mut children_of: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
    for (index, record) in records.iter().enumerate().skip(1) {
        if record.parent >= index {
            return Err(ConditionError::DanglingParent(index, record.parent));
        }
        children_of[record.parent].push(index);
    }

    Ok(build_node(records, &children_of, 0))
}

fn build_node(records: &[ConditionFlat], children_of: &[Vec<usize>], index: usize) -> Condition {
    let record = &records[index];
    Condition {
        param_type: record.param_type,
        operator: record.operator,
        comp_value: record.comp_value.clone(),
        children: children_of[index]
            .iter()
            .map(|&child| build_node(records, children_of, child))
            .collect(),
    }
}
