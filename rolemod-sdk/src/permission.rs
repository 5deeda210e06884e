// SPDX-License-Identifier: MIT OR Apache-2.0

//! Permissions as they are authored, before compilation into target state.

use alloy_primitives::{Address, Selector};
use rolemod_core::{Condition, ConditionError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::signature::selector_from_signature;
use crate::types::ExecutionFlags;

/// Reference to the function a permission applies to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionRef {
    /// 4-byte selector, as stored on-chain.
    Selector(Selector),

    /// Human-readable signature like `transfer(address,uint256)`.
    Signature(String),
}

impl FunctionRef {
    /// Selector of the referenced function, deriving it from the signature when needed.
    pub fn selector(&self) -> Result<Selector, PermissionError> {
        match self {
            FunctionRef::Selector(selector) => Ok(*selector),
            FunctionRef::Signature(signature) => selector_from_signature(signature),
        }
    }
}

impl From<Selector> for FunctionRef {
    fn from(selector: Selector) -> Self {
        FunctionRef::Selector(selector)
    }
}

/// A single authored permission, the unit the compiler ingests.
///
/// Multiple permissions may address the same target or function; compilation combines
/// them by taking the union of their execution flags and the logical or of their
/// conditions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    /// Allow every call to an address.
    Target {
        address: Address,

        #[serde(default)]
        flags: ExecutionFlags,
    },

    /// Allow calls to one function of an address, optionally gated by a condition.
    Function {
        address: Address,

        function: FunctionRef,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition: Option<Condition>,

        #[serde(default)]
        flags: ExecutionFlags,
    },
}

impl Permission {
    pub fn address(&self) -> Address {
        match self {
            Permission::Target { address, .. } | Permission::Function { address, .. } => *address,
        }
    }

    pub fn flags(&self) -> ExecutionFlags {
        match self {
            Permission::Target { flags, .. } | Permission::Function { flags, .. } => *flags,
        }
    }

    /// Identifier of the target address the permission applies to.
    pub fn target_id(&self) -> String {
        format!("{:#x}", self.address())
    }

    /// Identifier of the exact entity the permission applies to, distinguishing the
    /// functions of a target from the target itself.
    pub fn permission_id(&self) -> Result<String, PermissionError> {
        match self {
            Permission::Target { address, .. } => Ok(format!("{address:#x}")),
            Permission::Function {
                address, function, ..
            } => Ok(format!("{address:#x}.{:#x}", function.selector()?)),
        }
    }

    /// Checks that the permission can be compiled: the selector is resolvable and the
    /// condition, if any, passes integrity validation.
    pub fn validate(&self) -> Result<(), PermissionError> {
        if let Permission::Function {
            function,
            condition,
            ..
        } = self
        {
            function.selector()?;
            if let Some(condition) = condition {
                condition.validate()?;
            }
        }

        Ok(())
    }
}

/// Error types for authoring, compiling and planning permissions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    /// Condition failed integrity validation.
    #[error(transparent)]
    MalformedCondition(#[from] ConditionError),

    /// Signature string from which no selector can be derived.
    #[error("cannot derive a selector from \"{0}\", expected a signature like \"transfer(address,uint256)\"")]
    UnknownSignature(String),

    /// Target is granted at address level and scoped to functions at the same time.
    #[error("target {0} is both fully allowed and scoped to individual functions")]
    DuplicateTargetKey(Address),

    /// Permission is confirmed by one preset and excluded by another.
    #[error("permission {0} is confirmed by preset \"{1}\" but excluded by preset \"{2}\"")]
    PresetConflict(String, String, String),
}
