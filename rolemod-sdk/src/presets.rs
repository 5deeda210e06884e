// SPDX-License-Identifier: MIT OR Apache-2.0

//! Named permission presets and cross-preset consistency checks.
//!
//! A preset bundles permissions a role is expected to carry (or explicitly not carry)
//! while the preset is applied. Before several presets are applied together they are
//! checked against each other: a permission confirmed by one preset and excluded by
//! another is a conflict, unless the yielding side opted into being overridden.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::permission::{Permission, PermissionError};

/// What a preset expects of a single permission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    /// The permission must be granted while the preset is applied.
    Confirmed,

    /// The permission must not be granted while the preset is applied.
    Excluded,
}

/// One permission entry of a preset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetPermission {
    pub permission: Permission,

    pub disposition: Disposition,

    /// The entry yields to any opposite claim of another preset.
    #[serde(default)]
    pub allow_override: bool,
}

/// A named bundle of permission expectations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,

    pub permissions: Vec<PresetPermission>,
}

#[derive(Default)]
struct Claims {
    confirmed_by: Option<String>,
    excluded_by: Option<String>,
}

/// Checks that a set of presets can be applied together.
///
/// Every permission must be well formed, and no permission may be confirmed by one
/// preset while excluded by another, unless one of the two entries allows overriding.
pub fn validate_presets(presets: &[Preset]) -> Result<(), PermissionError> {
    let mut claims: IndexMap<String, Claims> = IndexMap::new();

    for preset in presets {
        for entry in &preset.permissions {
            entry.permission.validate()?;
            if entry.allow_override {
                continue;
            }

            let id = entry.permission.permission_id()?;
            let slot = claims.entry(id).or_default();
            let claimed_by = match entry.disposition {
                Disposition::Confirmed => &mut slot.confirmed_by,
                Disposition::Excluded => &mut slot.excluded_by,
            };
            if claimed_by.is_none() {
                *claimed_by = Some(preset.name.clone());
            }
        }
    }

    for (id, slot) in claims {
        if let (Some(confirmed_by), Some(excluded_by)) = (slot.confirmed_by, slot.excluded_by) {
            return Err(PermissionError::PresetConflict(id, confirmed_by, excluded_by));
        }
    }

    Ok(())
}
