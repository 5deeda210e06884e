// SPDX-License-Identifier: MIT OR Apache-2.0

//! Selector derivation from human-readable function signatures.
//!
//! Authored signatures may carry parameter names, data locations and whitespace, for
//! example `transfer(address to, uint256 amount)`. Canonicalization strips everything
//! besides the function name and the parameter types and expands the `uint` and `int`
//! aliases, so hashing yields the selector of the on-chain ABI signature.

use alloy_primitives::{Selector, keccak256};

use crate::permission::PermissionError;

/// Derives the 4-byte function selector from a human-readable signature.
pub fn selector_from_signature(signature: &str) -> Result<Selector, PermissionError> {
    let canonical = canonical_signature(signature)?;
    let digest = keccak256(canonical.as_bytes());
    Ok(Selector::from_slice(&digest[..4]))
}

/// Canonical form of a human-readable signature.
///
/// Parameter names, data locations and whitespace are removed, `uint` and `int` expand
/// to their full width and tuples end up in parenthesized form. Type names themselves
/// are passed through without further validation.
pub fn canonical_signature(signature: &str) -> Result<String, PermissionError> {
    let fail = || PermissionError::UnknownSignature(signature.to_string());

    let trimmed = signature.trim();
    let open = trimmed.find('(').ok_or_else(fail)?;
    let name = trimmed[..open].trim();
    if !is_identifier(name) {
        return Err(fail());
    }

    let mut parser = Parser::new(&trimmed[open..]);
    let params = parser.parse_params().ok_or_else(fail)?;
    if !parser.at_end() {
        return Err(fail());
    }

    Ok(format!("{name}{params}"))
}

fn is_identifier(candidate: &str) -> bool {
    let mut bytes = candidate.bytes();
    match bytes.next() {
        Some(byte) if is_ident_byte(byte) && !byte.is_ascii_digit() => bytes.all(is_ident_byte),
        _ => false,
    }
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$'
}

fn expand_alias(ident: &str) -> String {
    match ident {
        "uint" => "uint256".to_string(),
        "int" => "int256".to_string(),
        other => other.to_string(),
    }
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|byte| byte.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos == self.bytes.len()
    }

    /// Parses a parenthesized, comma-separated parameter list into canonical form.
    fn parse_params(&mut self) -> Option<String> {
        self.skip_whitespace();
        if self.bump() != Some(b'(') {
            return None;
        }

        let mut canonical = String::from("(");

        self.skip_whitespace();
        if self.peek() == Some(b')') {
            self.bump();
            canonical.push(')');
            return Some(canonical);
        }

        loop {
            canonical.push_str(&self.parse_param()?);
            self.skip_whitespace();
            match self.bump() {
                Some(b',') => canonical.push(','),
                Some(b')') => {
                    canonical.push(')');
                    return Some(canonical);
                }
                _ => return None,
            }
        }
    }

    /// Parses one parameter, dropping any data location and name following the type.
    fn parse_param(&mut self) -> Option<String> {
        let param_type = self.parse_type()?;

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b',' | b')') => return Some(param_type),
                Some(byte) if is_ident_byte(byte) && !byte.is_ascii_digit() => {
                    self.parse_identifier()?;
                }
                _ => return None,
            }
        }
    }

    fn parse_type(&mut self) -> Option<String> {
        self.skip_whitespace();

        let mut param_type = if self.peek() == Some(b'(') {
            self.parse_params()?
        } else {
            let ident = self.parse_identifier()?;
            if ident == "tuple" {
                // the `tuple(...)` spelling canonicalizes to plain parentheses
                self.parse_params()?
            } else {
                expand_alias(ident)
            }
        };

        // Array suffixes, possibly stacked: `[]`, `[4]`, `[4][]`.
        loop {
            self.skip_whitespace();
            if self.peek() != Some(b'[') {
                return Some(param_type);
            }
            self.bump();
            param_type.push('[');
            self.skip_whitespace();
            while let Some(byte @ b'0'..=b'9') = self.peek() {
                param_type.push(byte as char);
                self.bump();
            }
            self.skip_whitespace();
            if self.bump() != Some(b']') {
                return None;
            }
            param_type.push(']');
        }
    }

    fn parse_identifier(&mut self) -> Option<&'a str> {
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(is_ident_byte) {
            self.pos += 1;
        }
        if self.pos == start || self.bytes[start].is_ascii_digit() {
            return None;
        }

        // Identifier bytes are plain ASCII, checked byte by byte above.
        let bytes = &self.bytes[start..self.pos];
        std::str::from_utf8(bytes).ok()
    }
}
