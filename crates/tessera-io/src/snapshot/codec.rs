// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tagged strings used for values JSON cannot carry natively.
//!
//! Two kinds of values are written as strings with a recognizable shape:
//!
//! - an entity reference, `"@entity|<id>"`;
//! - an integer beyond 64 bits, `"<digits>n"` with an optional leading `-`.
//!
//! A plain string that happens to have one of these shapes, possibly behind
//! any number of leading backslashes, gets one more backslash on write. The
//! decoder removes exactly one, so every string reads back as itself.

use std::borrow::Cow;

use num_bigint::BigInt;
use tessera_core::ecs::EntityId;
use tessera_data::ecs::TYPE_SEPARATOR;

/// Prefix of an encoded entity reference.
pub const ENTITY_REF_SENTINEL: &str = "@entity";

/// Suffix of an encoded wide integer.
pub const BIGINT_MARKER: char = 'n';

const ESCAPE: char = '\\';

/// What a snapshot string stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<'a> {
    /// A reference to the entity with this id.
    Entity(EntityId),
    /// An arbitrary-precision integer.
    BigInt(BigInt),
    /// Plain text, with any escape removed.
    Text(Cow<'a, str>),
}

/// Encodes a reference to `id`.
pub fn encode_entity_ref(id: &EntityId) -> String {
    format!("{ENTITY_REF_SENTINEL}{TYPE_SEPARATOR}{id}")
}

/// Encodes a wide integer.
pub fn encode_bigint(value: &BigInt) -> String {
    format!("{value}{BIGINT_MARKER}")
}

/// Escapes a plain string if it would otherwise read back as a tagged value.
pub fn encode_string(text: &str) -> Cow<'_, str> {
    if parse_tagged(text.trim_start_matches(ESCAPE)).is_some() {
        Cow::Owned(format!("{ESCAPE}{text}"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Interprets a string read from a snapshot.
pub fn decode_string(text: &str) -> Decoded<'_> {
    if let Some(tagged) = parse_tagged(text) {
        return tagged;
    }
    let unescaped = text.trim_start_matches(ESCAPE);
    if unescaped.len() < text.len() && parse_tagged(unescaped).is_some() {
        Decoded::Text(Cow::Borrowed(&text[ESCAPE.len_utf8()..]))
    } else {
        Decoded::Text(Cow::Borrowed(text))
    }
}

fn parse_tagged(text: &str) -> Option<Decoded<'static>> {
    if let Some(id) = text
        .strip_prefix(ENTITY_REF_SENTINEL)
        .and_then(|rest| rest.strip_prefix(TYPE_SEPARATOR))
    {
        return (!id.is_empty()).then(|| Decoded::Entity(EntityId::new(id)));
    }

    let number = text.strip_suffix(BIGINT_MARKER)?;
    let digits = number.strip_prefix('-').unwrap_or(number);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    number.parse::<BigInt>().ok().map(Decoded::BigInt)
}
