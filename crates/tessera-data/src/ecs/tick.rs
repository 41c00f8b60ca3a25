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

use log::{trace, warn};

use crate::ecs::World;

/// Whether a tick actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    /// The tick began (and, for [`World::tick`], completed).
    Started,
    /// Another tick was in progress; nothing was done.
    Skipped,
}

#[derive(Debug, Default, Clone)]
pub(crate) struct TickClock {
    pub(crate) locked: bool,
    pub(crate) count: u64,
    pub(crate) time: f64,
    pub(crate) delta: f64,
}

impl World {
    /// Opens a tick.
    ///
    /// A tick that starts while another is still open is skipped, never
    /// queued: `time` and `delta` are left as they were.
    pub fn begin_tick(&mut self, delta: f64, time: f64) -> TickStatus {
        if self.clock.locked {
            warn!("Tick at t={time} skipped: the previous tick has not finished");
            return TickStatus::Skipped;
        }
        self.clock.locked = true;
        self.clock.count += 1;
        self.clock.delta = delta;
        self.clock.time = time;
        trace!("Tick {} started (t={time}, dt={delta})", self.clock.count);
        TickStatus::Started
    }

    /// Closes the current tick by reconciling the world.
    pub fn end_tick(&mut self) {
        self.cleanup();
        self.clock.locked = false;
    }

    /// Runs `systems` between [`World::begin_tick`] and [`World::end_tick`].
    pub fn tick(&mut self, delta: f64, time: f64, systems: impl FnOnce(&mut World)) -> TickStatus {
        if self.begin_tick(delta, time) == TickStatus::Skipped {
            return TickStatus::Skipped;
        }
        systems(self);
        self.end_tick();
        TickStatus::Started
    }

    /// True between `begin_tick` and `end_tick`.
    pub fn is_ticking(&self) -> bool {
        self.clock.locked
    }

    /// Number of ticks started so far.
    pub fn tick_count(&self) -> u64 {
        self.clock.count
    }

    /// The time passed to the last started tick.
    pub fn time(&self) -> f64 {
        self.clock.time
    }

    /// The delta passed to the last started tick.
    pub fn delta(&self) -> f64 {
        self.clock.delta
    }
}
