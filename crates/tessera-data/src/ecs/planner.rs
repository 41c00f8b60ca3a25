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

//! Internal query planning and caching.

use crate::ecs::{Domain, QueryPlan, QueryStep};
use log::trace;
use std::collections::HashMap;
use std::sync::Arc;

/// Number of plans kept before the memo starts over.
const PLAN_CAPACITY: usize = 1024;

/// Internal manager for query plans.
///
/// The `QueryPlanner` turns the steps of a query, in whatever order their
/// author wrote them, into a canonical [`QueryPlan`]. It caches generated
/// plans so that a query evaluated every tick is only canonicalized once.
#[derive(Debug, Default)]
pub(crate) struct QueryPlanner {
    /// Maps the author-ordered steps of a query to its canonical plan.
    plans: HashMap<Vec<QueryStep>, Arc<QueryPlan>>,
}

impl QueryPlanner {
    /// Creates a new `QueryPlanner` with an empty plan cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical plan for `steps`, building it on first use.
    ///
    /// Plans with an id step are built fresh on every call and never kept,
    /// since each distinct id list would otherwise stay in the memo for good.
    pub fn plan(&mut self, steps: &[QueryStep]) -> Arc<QueryPlan> {
        if let Some(plan) = self.plans.get(steps) {
            return plan.clone();
        }
        let plan = Arc::new(canonicalize(steps));
        if steps.iter().any(|step| step.domain == Domain::Id) {
            return plan;
        }
        if self.plans.len() >= PLAN_CAPACITY {
            trace!("Query planner memo full ({PLAN_CAPACITY} plans), starting over");
            self.plans.clear();
        }
        self.plans.insert(steps.to_vec(), plan.clone());
        plan
    }

    /// Number of distinct step lists planned so far.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.plans.len()
    }
}

/// Builds a canonical plan:
///
/// 1. steps are ordered by domain precedence (id, component, tag, entity
///    type), then by their signature;
/// 2. duplicate steps are dropped;
/// 3. the plan key joins the cache keys of the remaining steps, so `Some` and
///    id steps execute but take no part in it.
///
/// Every step is an intersection, so the reordering never changes the result.
pub(crate) fn canonicalize(steps: &[QueryStep]) -> QueryPlan {
    let mut ordered: Vec<(Domain, String, QueryStep)> = steps
        .iter()
        .map(|step| (step.domain, step.signature(), step.clone()))
        .collect();
    ordered.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
    ordered.dedup_by(|a, b| a.1 == b.1);

    let steps: Vec<QueryStep> = ordered.into_iter().map(|(_, _, step)| step).collect();
    let key = steps
        .iter()
        .filter(|step| !step.cache_key.is_empty())
        .map(|step| step.cache_key.as_str())
        .collect::<Vec<_>>()
        .join(";");

    QueryPlan { steps, key }
}
