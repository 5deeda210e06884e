// SPDX-License-Identifier: MIT OR Apache-2.0

use std::cmp::Ordering;

use alloy_primitives::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::key::AllowanceKey;

/// ABI shape of the value a condition node scopes.
///
/// Discriminants mirror the roles modifier wire format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ParamType {
    /// No value bound, used by logical nodes and call-level allowance checks.
    None = 0,
    /// Single 32-byte word (integers, addresses, bools, `bytesN`).
    Static = 1,
    /// Length-prefixed value (`bytes`, `string`).
    Dynamic = 2,
    Tuple = 3,
    Array = 4,
    /// Function call data, 4-byte selector followed by ABI-encoded arguments.
    Calldata = 5,
    /// Standalone ABI-encoded blob without a selector.
    AbiEncoded = 6,
}

impl ParamType {
    /// Composite types carry children describing their inner ABI layout.
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            ParamType::Tuple | ParamType::Array | ParamType::Calldata | ParamType::AbiEncoded
        )
    }
}

impl From<ParamType> for u8 {
    fn from(value: ParamType) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for ParamType {
    type Error = ConditionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ParamType::None),
            1 => Ok(ParamType::Static),
            2 => Ok(ParamType::Dynamic),
            3 => Ok(ParamType::Tuple),
            4 => Ok(ParamType::Array),
            5 => Ok(ParamType::Calldata),
            6 => Ok(ParamType::AbiEncoded),
            other => Err(ConditionError::UnknownParamType(other)),
        }
    }
}

/// Check a condition node applies to the value bound by its parameter type.
///
/// Discriminants mirror the roles modifier wire format; gaps are reserved slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Operator {
    /// No constraint. Kept where the node is needed to mirror ABI layout.
    Pass = 0,
    And = 1,
    Or = 2,
    Nor = 3,
    /// Value decomposes into children, each of which must hold for its part.
    Matches = 5,
    /// At least one array element satisfies the child condition.
    ArraySome = 6,
    /// Every array element satisfies the child condition.
    ArrayEvery = 7,
    /// Every array element matches a distinct child condition.
    ArraySubset = 8,
    /// Value equals the avatar address executing the call.
    EqualToAvatar = 15,
    EqualTo = 16,
    GreaterThan = 17,
    LessThan = 18,
    SignedIntGreaterThan = 19,
    SignedIntLessThan = 20,
    /// Masked bytes of the value equal the expected pattern.
    Bitmask = 21,
    /// Defer the check to an adapter contract given in the comparison value.
    Custom = 22,
    /// Value is deducted from the allowance referenced by the comparison value.
    WithinAllowance = 28,
    /// Call value (ether) is deducted from the referenced allowance.
    EtherWithinAllowance = 29,
    /// Each call is deducted from the referenced allowance.
    CallWithinAllowance = 30,
}

impl Operator {
    /// Logical connectives over child conditions.
    pub fn is_logical(&self) -> bool {
        matches!(self, Operator::And | Operator::Or | Operator::Nor)
    }

    /// Operators whose children may be reordered and deduplicated without changing meaning.
    pub fn is_commutative(&self) -> bool {
        self.is_logical()
    }

    /// Operators where nesting the same operator is a no-op. Nor is commutative but not
    /// associative: `Nor(a, Nor(b))` negates the inner negation.
    pub fn is_associative(&self) -> bool {
        matches!(self, Operator::And | Operator::Or)
    }

    /// Operators requiring a comparison value on the node.
    pub fn requires_comp_value(&self) -> bool {
        matches!(
            self,
            Operator::EqualTo
                | Operator::GreaterThan
                | Operator::LessThan
                | Operator::SignedIntGreaterThan
                | Operator::SignedIntLessThan
                | Operator::Bitmask
                | Operator::Custom
                | Operator::WithinAllowance
                | Operator::EtherWithinAllowance
                | Operator::CallWithinAllowance
        )
    }

    /// Operators requiring at least one child condition.
    pub fn requires_children(&self) -> bool {
        self.is_logical()
            || matches!(
                self,
                Operator::Matches
                    | Operator::ArraySome
                    | Operator::ArrayEvery
                    | Operator::ArraySubset
            )
    }
}

impl From<Operator> for u8 {
    fn from(value: Operator) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for Operator {
    type Error = ConditionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Operator::Pass),
            1 => Ok(Operator::And),
            2 => Ok(Operator::Or),
            3 => Ok(Operator::Nor),
            5 => Ok(Operator::Matches),
            6 => Ok(Operator::ArraySome),
            7 => Ok(Operator::ArrayEvery),
            8 => Ok(Operator::ArraySubset),
            15 => Ok(Operator::EqualToAvatar),
            16 => Ok(Operator::EqualTo),
            17 => Ok(Operator::GreaterThan),
            18 => Ok(Operator::LessThan),
            19 => Ok(Operator::SignedIntGreaterThan),
            20 => Ok(Operator::SignedIntLessThan),
            21 => Ok(Operator::Bitmask),
            22 => Ok(Operator::Custom),
            28 => Ok(Operator::WithinAllowance),
            29 => Ok(Operator::EtherWithinAllowance),
            30 => Ok(Operator::CallWithinAllowance),
            other => Err(ConditionError::UnknownOperator(other)),
        }
    }
}

/// Node of a condition tree scoping what call data a permission admits.
///
/// Trees follow the ABI layout of the scoped function: a `Calldata` root with one child per
/// argument, tuples and arrays nesting further children. Logical nodes (`And`/`Or`/`Nor`) sit
/// at parameter type `None` and combine their children's verdicts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub param_type: ParamType,
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comp_value: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Condition>,
}

impl Condition {
    /// Unconstrained node mirroring ABI layout.
    pub fn pass(param_type: ParamType) -> Self {
        Self {
            param_type,
            operator: Operator::Pass,
            comp_value: None,
            children: Vec::new(),
        }
    }

    pub fn and(children: Vec<Condition>) -> Self {
        Self::logical(Operator::And, children)
    }

    pub fn or(children: Vec<Condition>) -> Self {
        Self::logical(Operator::Or, children)
    }

    pub fn nor(children: Vec<Condition>) -> Self {
        Self::logical(Operator::Nor, children)
    }

    fn logical(operator: Operator, children: Vec<Condition>) -> Self {
        Self {
            param_type: ParamType::None,
            operator,
            comp_value: None,
            children,
        }
    }

    /// Structural match of a composite value against one child condition per part.
    pub fn matches(param_type: ParamType, children: Vec<Condition>) -> Self {
        Self {
            param_type,
            operator: Operator::Matches,
            comp_value: None,
            children,
        }
    }

    pub fn equal_to(param_type: ParamType, comp_value: impl Into<Bytes>) -> Self {
        Self {
            param_type,
            operator: Operator::EqualTo,
            comp_value: Some(comp_value.into()),
            children: Vec::new(),
        }
    }

    pub fn greater_than(comp_value: impl Into<Bytes>) -> Self {
        Self {
            param_type: ParamType::Static,
            operator: Operator::GreaterThan,
            comp_value: Some(comp_value.into()),
            children: Vec::new(),
        }
    }

    pub fn less_than(comp_value: impl Into<Bytes>) -> Self {
        Self {
            param_type: ParamType::Static,
            operator: Operator::LessThan,
            comp_value: Some(comp_value.into()),
            children: Vec::new(),
        }
    }

    pub fn equal_to_avatar() -> Self {
        Self {
            param_type: ParamType::Static,
            operator: Operator::EqualToAvatar,
            comp_value: None,
            children: Vec::new(),
        }
    }

    /// Constrain a static argument to spend from the referenced allowance.
    pub fn within_allowance(key: AllowanceKey) -> Self {
        Self {
            param_type: ParamType::Static,
            operator: Operator::WithinAllowance,
            comp_value: Some(Bytes::copy_from_slice(key.as_bytes())),
            children: Vec::new(),
        }
    }

    /// Deduct the call's ether value from the referenced allowance.
    pub fn ether_within_allowance(key: AllowanceKey) -> Self {
        Self {
            param_type: ParamType::None,
            operator: Operator::EtherWithinAllowance,
            comp_value: Some(Bytes::copy_from_slice(key.as_bytes())),
            children: Vec::new(),
        }
    }

    /// Deduct one unit per call from the referenced allowance.
    pub fn call_within_allowance(key: AllowanceKey) -> Self {
        Self {
            param_type: ParamType::None,
            operator: Operator::CallWithinAllowance,
            comp_value: Some(Bytes::copy_from_slice(key.as_bytes())),
            children: Vec::new(),
        }
    }

    /// Check the tree is well-formed against the wire format's integrity rules.
    ///
    /// Reports the first violation with the node's dot-separated index path from the root
    /// (`"0"` is the root, `"0.2.1"` the second child of the root's third child).
    pub fn validate(&self) -> Result<(), ConditionError> {
        let mut trail = Vec::new();
        validate_node(self, &mut trail)
    }
}

// Manual order over (param_type, operator, comp_value, children): the canonical total order
// used to sort and deduplicate children of commutative operators.
impl Ord for Condition {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.param_type, self.operator, self.comp_value.as_deref())
            .cmp(&(other.param_type, other.operator, other.comp_value.as_deref()))
            .then_with(|| self.children.cmp(&other.children))
    }
}

impl PartialOrd for Condition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn validate_node(node: &Condition, trail: &mut Vec<usize>) -> Result<(), ConditionError> {
    use Operator::*;

    let path = || path_string(trail);

    match node.operator {
        And | Or | Nor => {
            if node.param_type != ParamType::None {
                return Err(ConditionError::UnsuitableParamType(
                    path(),
                    node.operator,
                    node.param_type,
                ));
            }
        }
        Matches => {
            if !node.param_type.is_composite() {
                return Err(ConditionError::UnsuitableParamType(
                    path(),
                    node.operator,
                    node.param_type,
                ));
            }
        }
        ArraySome | ArrayEvery | ArraySubset => {
            if node.param_type != ParamType::Array {
                return Err(ConditionError::UnsuitableParamType(
                    path(),
                    node.operator,
                    node.param_type,
                ));
            }
        }
        EqualTo => {
            if !matches!(
                node.param_type,
                ParamType::Static | ParamType::Dynamic | ParamType::Tuple | ParamType::Array
            ) {
                return Err(ConditionError::UnsuitableParamType(
                    path(),
                    node.operator,
                    node.param_type,
                ));
            }
        }
        EqualToAvatar | GreaterThan | LessThan | SignedIntGreaterThan | SignedIntLessThan
        | WithinAllowance => {
            if node.param_type != ParamType::Static {
                return Err(ConditionError::UnsuitableParamType(
                    path(),
                    node.operator,
                    node.param_type,
                ));
            }
        }
        Bitmask => {
            if !matches!(node.param_type, ParamType::Static | ParamType::Dynamic) {
                return Err(ConditionError::UnsuitableParamType(
                    path(),
                    node.operator,
                    node.param_type,
                ));
            }
        }
        EtherWithinAllowance | CallWithinAllowance => {
            if node.param_type != ParamType::None {
                return Err(ConditionError::UnsuitableParamType(
                    path(),
                    node.operator,
                    node.param_type,
                ));
            }
        }
        Pass | Custom => (),
    }

    if node.operator.requires_comp_value() && node.comp_value.is_none() {
        return Err(ConditionError::MissingCompValue(path(), node.operator));
    }
    if !node.operator.requires_comp_value() && node.comp_value.is_some() {
        return Err(ConditionError::UnexpectedCompValue(path(), node.operator));
    }

    if node.operator.requires_children() && node.children.is_empty() {
        return Err(ConditionError::MissingChildren(path(), node.operator));
    }
    // Outside of logical connectives, children only describe the inner layout of composite
    // values; leaves must not carry any.
    if !node.children.is_empty()
        && !node.operator.requires_children()
        && !node.param_type.is_composite()
    {
        return Err(ConditionError::UnexpectedChildren(path(), node.param_type));
    }

    for (index, child) in node.children.iter().enumerate() {
        trail.push(index);
        validate_node(child, trail)?;
        trail.pop();
    }

    Ok(())
}

fn path_string(trail: &[usize]) -> String {
    let mut path = String::from("0");
    for index in trail {
        path.push('.');
        path.push_str(&index.to_string());
    }
    path
}

/// Error types for condition trees and their flat encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    /// Wire discriminant does not name a parameter type.
    #[error("unknown parameter type {0}")]
    UnknownParamType(u8),

    /// Wire discriminant does not name an operator, or names a reserved slot.
    #[error("unknown operator {0}")]
    UnknownOperator(u8),

    /// Operator needs child conditions.
    #[error("{1:?} condition at {0} requires children")]
    MissingChildren(String, Operator),

    /// Leaf node carries children.
    #[error("{1:?} leaf at {0} cannot have children")]
    UnexpectedChildren(String, ParamType),

    /// Operator needs a comparison value.
    #[error("{1:?} condition at {0} requires a comparison value")]
    MissingCompValue(String, Operator),

    /// Operator does not take a comparison value.
    #[error("{1:?} condition at {0} cannot carry a comparison value")]
    UnexpectedCompValue(String, Operator),

    /// Operator cannot apply to a value of this parameter type.
    #[error("{1:?} condition at {0} does not apply to {2:?} parameter")]
    UnsuitableParamType(String, Operator, ParamType),

    /// Flat encoding holds no nodes.
    #[error("flat condition encoding is empty")]
    EmptyEncoding,

    /// Flat encoding references a parent which does not precede the node.
    #[error("node at index {0} references parent {1} which does not precede it")]
    DanglingParent(usize, usize),
}
