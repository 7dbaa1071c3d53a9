// Catapult - Declarative EVM Deployment Orchestrator
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Scanner for the `{{reference}}` placeholder language.
//!
//! A reference string is a sequence of literal text and `{{identifier}}`
//! placeholders. The scanner walks the string once and returns the segment
//! list; evaluation lives in the resolver.

use eyre::{bail, Result};

/// One piece of a reference string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text, passed through.
    Literal(String),
    /// A `{{…}}` placeholder; the identifier is stored trimmed.
    Reference(String),
}

/// Split a string into literal and placeholder segments.
///
/// An unterminated `{{` or an empty placeholder is an error. Single braces
/// are literal text.
pub fn scan(input: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = input;

    while let Some(start) = rest.find("{{") {
        literal.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            bail!("unterminated placeholder in {input:?}");
        };
        let identifier = after_open[..end].trim();
        if identifier.is_empty() {
            bail!("empty placeholder in {input:?}");
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Reference(identifier.to_string()));
        rest = &after_open[end + 2..];
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// When the whole string is exactly one placeholder, its identifier.
pub fn single_reference(segments: &[Segment]) -> Option<&str> {
    match segments {
        [Segment::Reference(identifier)] => Some(identifier),
        _ => None,
    }
}

/// Whether the string contains any placeholder at all.
pub fn has_reference(input: &str) -> bool {
    input.contains("{{")
}
