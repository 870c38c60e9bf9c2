/*
 * Copyright (C) 2024 Open Source Robotics Foundation
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 *
*/

use std::{sync::Arc, time::Instant};

/// A termination condition for the two planning loops. The joint solver
/// polls one of these between node expansions and between child replans;
/// the tree planner polls its own between extensions. Polling is the only
/// cancellation point: a poll that answers true ends the loop before its
/// next unit of work, never in the middle of one.
///
/// `Mem` is the loop's memory (the constraint-tree arena for the joint
/// solver, the motion arena for the tree planner), so a condition can also
/// key off how large the search has grown.
pub trait Halt<Mem>: Clone {
    fn halt(&mut self, memory: &Mem) -> bool;
}

/// The empty tuple never halts: a solve handed `()` runs until it finds a
/// conflict-free plan or exhausts its frontier.
impl<Mem> Halt<Mem> for () {
    fn halt(&mut self, _: &Mem) -> bool {
        false
    }
}

/// Halt as soon as either of the combined conditions asks to halt. Both are
/// polled every time so that a step counter keeps counting even while a
/// deadline condition is the one that eventually trips.
impl<Mem, A: Halt<Mem>, B: Halt<Mem>> Halt<Mem> for (A, B) {
    fn halt(&mut self, memory: &Mem) -> bool {
        let a = self.0.halt(memory);
        let b = self.1.halt(memory);
        a || b
    }
}

/// A caller-owned cancellation switch. The callback is polled at every
/// cancellation point, so flipping it from outside (a UI button, a signal
/// handler, a supervising process) ends the solve at the next expansion
/// with a `solved: false` report.
#[derive(Clone)]
pub struct Interrupter(Arc<dyn Fn() -> bool>);

impl Interrupter {
    /// Wrap a callback that answers true once the solve should stop.
    pub fn new<F: Fn() -> bool + 'static>(is_cancelled: F) -> Self {
        Self(Arc::new(is_cancelled))
    }
}

impl<Mem> Halt<Mem> for Interrupter {
    fn halt(&mut self, _: &Mem) -> bool {
        (self.0)()
    }
}

/// Caps how many times the loop may come back for more work. One poll
/// happens per unit of work, so the cap is also the iteration budget: the
/// tree planner checks it once per attempted extension, the joint solver
/// once per expansion and once per child replan. With no cap this never
/// halts.
#[derive(Debug, Clone)]
pub struct StepLimit {
    taken: usize,
    pub limit: Option<usize>,
}

impl StepLimit {
    pub fn new(limit: Option<usize>) -> Self {
        Self { taken: 0, limit }
    }
}

impl<Mem> Halt<Mem> for StepLimit {
    fn halt(&mut self, _: &Mem) -> bool {
        self.taken += 1;
        match self.limit {
            Some(limit) => self.taken > limit,
            None => false,
        }
    }
}

/// A wall-clock budget. The clock starts on the first poll, so the same
/// value can be constructed ahead of time and handed to a later solve. The
/// joint solver builds one of these per low-level invocation from its
/// configured planning time.
#[derive(Debug, Clone)]
pub struct TimeLimit {
    started: Option<Instant>,
    pub limit: Option<std::time::Duration>,
}

impl TimeLimit {
    pub fn new(limit: Option<std::time::Duration>) -> Self {
        Self {
            started: None,
            limit,
        }
    }

    pub fn from_secs_f64(seconds: f64) -> Self {
        Self::new(Some(std::time::Duration::from_secs_f64(seconds)))
    }
}

impl<Mem> Halt<Mem> for TimeLimit {
    fn halt(&mut self, _: &Mem) -> bool {
        let limit = match self.limit {
            Some(limit) => limit,
            None => return false,
        };
        let started = *self.started.get_or_insert_with(Instant::now);
        started.elapsed() > limit
    }
}
