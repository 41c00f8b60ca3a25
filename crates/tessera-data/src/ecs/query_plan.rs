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

//! Defines filter steps and the `QueryPlan` they are canonicalized into.

use std::fmt;
use tessera_core::ecs::{Identifier, KeySet};

/// The attribute space a filter step looks at.
///
/// The declaration order is the execution precedence: id lookups are the
/// cheapest and most selective, entity types the broadest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Domain {
    /// Explicit entity ids.
    Id,
    /// Component type names.
    Component,
    /// Tags.
    Tag,
    /// Entity type names.
    EntityType,
}

impl Domain {
    /// The domains backed by a registry and an entity index.
    pub const INDEXED: [Domain; 3] = [Domain::Component, Domain::Tag, Domain::EntityType];

    fn as_str(self) -> &'static str {
        match self {
            Domain::Id => "id",
            Domain::Component => "component",
            Domain::Tag => "tag",
            Domain::EntityType => "type",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a step's operands are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constraint {
    /// The entity holds every operand.
    All,
    /// The entity holds at least one operand.
    Any,
    /// The entity holds no operand.
    None,
    /// Like `Any`, but only narrows the candidates already selected and is never cached.
    Some,
}

impl Constraint {
    fn as_str(self) -> &'static str {
        match self {
            Constraint::All => "all",
            Constraint::Any => "any",
            Constraint::None => "none",
            Constraint::Some => "some",
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One filter clause of a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryStep {
    /// How the operands combine.
    pub constraint: Constraint,
    /// Which attribute space the operands name.
    pub domain: Domain,
    /// Component names, tags, entity type names, or entity ids.
    pub operands: Vec<String>,
    /// The canonical key this step's result is cached under; empty when uncacheable.
    pub cache_key: String,
}

impl QueryStep {
    /// Creates a step with sorted, deduplicated operands and its cache key.
    pub fn new<S: Into<String>>(
        constraint: Constraint,
        domain: Domain,
        operands: impl IntoIterator<Item = S>,
    ) -> Self {
        let mut operands: Vec<String> = operands.into_iter().map(Into::into).collect();
        operands.sort();
        operands.dedup();

        let mut step = Self {
            constraint,
            domain,
            operands,
            cache_key: String::new(),
        };
        if Self::is_cacheable(constraint, domain) {
            step.cache_key = step.signature();
        }
        step
    }

    /// `constraint:domain:operands`, the text a cache key is made of.
    ///
    /// Operands are comma-separated, with `\`, `,`, `:` and `;` inside an
    /// operand escaped by a backslash. A step without operands ends after the
    /// domain, so it never reads the same as a step with one empty operand.
    pub fn signature(&self) -> String {
        let mut out = format!("{}:{}", self.constraint, self.domain);
        for (i, operand) in self.operands.iter().enumerate() {
            out.push(if i == 0 { ':' } else { ',' });
            for c in operand.chars() {
                if matches!(c, '\\' | ',' | ':' | ';') {
                    out.push('\\');
                }
                out.push(c);
            }
        }
        out
    }

    /// `Some` steps narrow and id steps are direct lookups; neither is memoized.
    pub fn is_cacheable(constraint: Constraint, domain: Domain) -> bool {
        constraint != Constraint::Some && domain != Domain::Id
    }
}

/// A canonical, ready-to-execute ordering of query steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    /// Steps sorted by domain precedence with duplicates removed.
    pub steps: Vec<QueryStep>,
    /// The canonical key of the whole query, built from its cacheable steps.
    pub key: String,
}

/// A step whose operand names have been looked up in the registry.
#[derive(Debug, Clone)]
pub struct ResolvedStep {
    /// How the operands combine.
    pub constraint: Constraint,
    /// Which attribute space the operands name.
    pub domain: Domain,
    /// The identifiers of operands that are currently registered.
    pub identifiers: Vec<Identifier>,
    /// The bitwise OR of `identifiers`.
    pub mask: KeySet,
    /// False if at least one operand has no live identifier.
    pub fully_resolved: bool,
    /// Copied from the originating step.
    pub cache_key: String,
}

impl ResolvedStep {
    /// Tests an entity's composite key for this step's domain against the step.
    ///
    /// An unknown operand is an empty match set: `All` can never be satisfied,
    /// while `Any`, `Some` and `None` simply ignore it.
    pub fn matches(&self, key: &KeySet) -> bool {
        match self.constraint {
            Constraint::All => self.fully_resolved && key.contains_all(&self.mask),
            Constraint::Any | Constraint::Some => key.intersects(&self.mask),
            Constraint::None => key.is_disjoint(&self.mask),
        }
    }

    /// True if the result may be stored in the query cache.
    pub fn cacheable(&self) -> bool {
        !self.cache_key.is_empty() && self.fully_resolved
    }
}
