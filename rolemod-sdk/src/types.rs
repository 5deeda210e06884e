// SPDX-License-Identifier: MIT OR Apache-2.0

//! State model of a roles modifier: roles, their cleared targets and scoped functions,
//! shared allowance budgets and role annotations.

use alloy_primitives::{Address, Selector, U256};
use rolemod_core::{AllowanceKey, Condition, RoleKey};
use serde::{Deserialize, Serialize};

/// Execution options of a call, as stored on-chain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ExecutionOptions {
    /// Plain call only.
    #[default]
    None = 0,

    /// Ether can be sent along with the call.
    Send = 1,

    /// The call can be performed as a delegate call.
    DelegateCall = 2,

    /// Both sending ether and delegate calls are permitted.
    Both = 3,
}

impl ExecutionOptions {
    pub fn new(send: bool, delegatecall: bool) -> Self {
        match (send, delegatecall) {
            (false, false) => ExecutionOptions::None,
            (true, false) => ExecutionOptions::Send,
            (false, true) => ExecutionOptions::DelegateCall,
            (true, true) => ExecutionOptions::Both,
        }
    }

    pub fn send(&self) -> bool {
        matches!(self, ExecutionOptions::Send | ExecutionOptions::Both)
    }

    pub fn delegatecall(&self) -> bool {
        matches!(self, ExecutionOptions::DelegateCall | ExecutionOptions::Both)
    }
}

impl From<ExecutionOptions> for u8 {
    fn from(options: ExecutionOptions) -> u8 {
        options as u8
    }
}

impl TryFrom<u8> for ExecutionOptions {
    type Error = UnknownExecutionOptions;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ExecutionOptions::None),
            1 => Ok(ExecutionOptions::Send),
            2 => Ok(ExecutionOptions::DelegateCall),
            3 => Ok(ExecutionOptions::Both),
            unknown => Err(UnknownExecutionOptions(unknown)),
        }
    }
}

/// Error type for execution option decoding.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unknown execution options value {0}")]
pub struct UnknownExecutionOptions(pub u8);

/// Execution options in the shape permissions are authored in.
///
/// Individual permissions carry independent boolean flags so that several permissions
/// for the same function can be combined with a plain union.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionFlags {
    #[serde(default)]
    pub send: bool,

    #[serde(default)]
    pub delegatecall: bool,
}

impl ExecutionFlags {
    pub fn union(self, other: Self) -> Self {
        Self {
            send: self.send || other.send,
            delegatecall: self.delegatecall || other.delegatecall,
        }
    }
}

impl From<ExecutionFlags> for ExecutionOptions {
    fn from(flags: ExecutionFlags) -> Self {
        ExecutionOptions::new(flags.send, flags.delegatecall)
    }
}

impl From<ExecutionOptions> for ExecutionFlags {
    fn from(options: ExecutionOptions) -> Self {
        Self {
            send: options.send(),
            delegatecall: options.delegatecall(),
        }
    }
}

/// Clearance level of a target address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Clearance {
    /// Every call to the address is allowed.
    Target = 1,

    /// Only the explicitly scoped functions of the address are allowed.
    Function = 2,
}

/// Scoping of a single function on a target address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub selector: Selector,

    pub options: ExecutionOptions,

    /// Calls to the selector pass regardless of their arguments.
    pub wildcarded: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

/// One target address a role has been granted access to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub address: Address,

    pub clearance: Clearance,

    pub options: ExecutionOptions,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<Function>,
}

impl Target {
    /// Target fully allowed at address level.
    pub fn allowed(address: Address, options: ExecutionOptions) -> Self {
        Self {
            address,
            clearance: Clearance::Target,
            options,
            functions: Vec::new(),
        }
    }

    /// Target restricted to an explicit set of scoped functions.
    pub fn scoped(address: Address, functions: Vec<Function>) -> Self {
        Self {
            address,
            clearance: Clearance::Function,
            options: ExecutionOptions::None,
            functions,
        }
    }
}

/// A shared, periodically refilling spending budget.
///
/// Conditions refer to allowances by key through the `WithinAllowance`,
/// `EtherWithinAllowance` and `CallWithinAllowance` operators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowance {
    pub key: AllowanceKey,

    /// Amount added to the balance every period.
    pub refill: U256,

    /// Ceiling the balance can refill up to.
    pub max_refill: U256,

    /// Refill interval in seconds, zero for one-off budgets.
    pub period: U256,

    pub balance: U256,

    /// Timestamp of the last refill, maintained by the contract.
    pub timestamp: U256,
}

impl Allowance {
    /// An all-zero record, written to clear the slot for `key`.
    pub fn cleared(key: AllowanceKey) -> Self {
        Self {
            key,
            refill: U256::ZERO,
            max_refill: U256::ZERO,
            period: U256::ZERO,
            balance: U256::ZERO,
            timestamp: U256::ZERO,
        }
    }

    pub fn is_cleared(&self) -> bool {
        self.refill.is_zero()
            && self.max_refill.is_zero()
            && self.period.is_zero()
            && self.balance.is_zero()
            && self.timestamp.is_zero()
    }
}

/// Off-chain annotation attached to a role, resolved through a schema.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotation {
    pub uri: String,

    pub schema: String,
}

/// A role with its members and everything it is permitted to call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub key: RoleKey,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<Address>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<Target>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,

    /// Block number of the last update, zero when never updated.
    #[serde(default)]
    pub last_update: u64,
}

impl Role {
    pub fn new(key: RoleKey) -> Self {
        Self {
            key,
            members: Vec::new(),
            targets: Vec::new(),
            annotations: Vec::new(),
            last_update: 0,
        }
    }
}

/// Full state snapshot of one roles modifier instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolesMod {
    pub address: Address,

    pub owner: Address,

    /// Account the modifier executes through.
    pub avatar: Address,

    /// Account transactions are forwarded to, usually equal to the avatar.
    pub target: Address,

    /// Addresses whose calldata the modifier unwraps before scoping, usually
    /// multi-send contracts. Context for consumers, never diffed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unwrap_adapters: Vec<Address>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<Role>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowances: Vec<Allowance>,
}

impl RolesMod {
    pub fn role(&self, key: &RoleKey) -> Option<&Role> {
        self.roles.iter().find(|role| &role.key == key)
    }
}
