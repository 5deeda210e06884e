// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size of role and allowance keys.
pub const KEY_LEN: usize = 32;

/// 32-byte key identifying a role on the roles modifier.
///
/// Keys are usually derived from short human-readable labels, encoded the way `bytes32` strings
/// are on-chain: the label's bytes followed by zero padding. Parsing accepts either a plain label
/// of at most 32 bytes or a `0x`-prefixed 64-digit hex string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoleKey([u8; KEY_LEN]);

/// 32-byte key identifying a shared allowance budget on the roles modifier.
///
/// Allowances are not owned by any single role; conditions reference them by key through their
/// comparison value. Encoding rules are the same as for [`RoleKey`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AllowanceKey([u8; KEY_LEN]);

macro_rules! key_impls {
    ($name:ident) => {
        impl $name {
            /// Create a key from its raw bytes representation.
            pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
                Self(bytes)
            }

            /// Encode a short label as a zero-padded key.
            pub fn from_label(label: &str) -> Result<Self, KeyError> {
                Ok(Self(encode_label(label)?))
            }

            /// Bytes of the key.
            pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
                &self.0
            }

            /// Convert the key to a `0x`-prefixed hex string.
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }

            /// Recover the label this key encodes, if it is a zero-padded printable ASCII string.
            pub fn label(&self) -> Option<&str> {
                decode_label(&self.0)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; KEY_LEN]> for $name {
            fn from(value: [u8; KEY_LEN]) -> Self {
                Self(value)
            }
        }

        impl From<$name> for [u8; KEY_LEN] {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = KeyError;

            fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
                let value_len = value.len();

                let checked_value: [u8; KEY_LEN] = value
                    .try_into()
                    .map_err(|_| KeyError::InvalidLength(value_len, KEY_LEN))?;

                Ok(Self(checked_value))
            }
        }

        impl FromStr for $name {
            type Err = KeyError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Ok(Self(parse_key(value)?))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.label() {
                    Some(label) => write!(f, "{label}"),
                    None => write!(f, "{}", self.to_hex()),
                }
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.to_hex()).finish()
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serialize_hex(&self.0, serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let bytes = deserialize_hex(deserializer)?;

                bytes
                    .as_slice()
                    .try_into()
                    .map_err(|err: KeyError| serde::de::Error::custom(err.to_string()))
            }
        }
    };
}

key_impls!(RoleKey);
key_impls!(AllowanceKey);

fn encode_label(label: &str) -> Result<[u8; KEY_LEN], KeyError> {
    let raw = label.as_bytes();
    if raw.is_empty() || raw.len() > KEY_LEN {
        return Err(KeyError::InvalidLabelLength(raw.len()));
    }

    let mut bytes = [0; KEY_LEN];
    bytes[..raw.len()].copy_from_slice(raw);
    Ok(bytes)
}

fn decode_label(bytes: &[u8; KEY_LEN]) -> Option<&str> {
    let end = KEY_LEN - bytes.iter().rev().take_while(|byte| **byte == 0).count();
    if end == 0 {
        return None;
    }

    let head = &bytes[..end];
    if !head.iter().all(|byte| byte.is_ascii_graphic() || *byte == b' ') {
        return None;
    }

    // Checked to be printable ASCII above.
    std::str::from_utf8(head).ok()
}

fn parse_key(value: &str) -> Result<[u8; KEY_LEN], KeyError> {
    match value.strip_prefix("0x") {
        Some(digits) => {
            let bytes = hex::decode(digits)?;
            let value_len = bytes.len();
            bytes
                .try_into()
                .map_err(|_| KeyError::InvalidLength(value_len, KEY_LEN))
        }
        None => encode_label(value),
    }
}

/// Helper method for `serde` to serialize bytes into a `0x`-prefixed hex string when using a
/// human readable encoding (JSON), otherwise it serializes the bytes directly.
fn serialize_hex<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    if serializer.is_human_readable() {
        serializer.serialize_str(&format!("0x{}", hex::encode(value)))
    } else {
        serde_bytes::Bytes::new(value).serialize(serializer)
    }
}

/// Helper method for `serde` to deserialize from a hex string (with or without `0x` prefix) into
/// bytes when using a human readable encoding (JSON), otherwise it deserializes the bytes
/// directly.
fn deserialize_hex<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    if deserializer.is_human_readable() {
        let value = String::deserialize(deserializer)?;
        let digits = value.strip_prefix("0x").unwrap_or(&value);
        hex::decode(digits).map_err(serde::de::Error::custom)
    } else {
        let bytes = serde_bytes::ByteBuf::deserialize(deserializer)?;
        Ok(bytes.into_vec())
    }
}

/// Error types for `RoleKey` and `AllowanceKey` structs.
#[derive(Error, Debug)]
pub enum KeyError {
    /// Key has an invalid length.
    #[error("invalid key length {0} bytes, expected {1} bytes")]
    InvalidLength(usize, usize),

    /// Key label does not fit a 32-byte slot.
    #[error("key label must be 1 to 32 bytes, got {0} bytes")]
    InvalidLabelLength(usize),

    /// Key string contains invalid hexadecimal characters.
    #[error("invalid hex encoding in key string")]
    InvalidHexEncoding(#[from] hex::FromHexError),
}
