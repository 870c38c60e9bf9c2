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

use crate::domain::{Agent, Propagator};
use crate::motion::{Footprint, Oriented, Positioned, TimePoint, TimeWindow, Trajectory};
use smallvec::SmallVec;
use std::sync::Arc;

/// A region of the workspace that one agent must stay out of during a
/// window of time. Constraints are introduced by the high-level search and
/// shared by every descendant of the node that introduced them.
#[derive(Clone, Debug)]
pub struct Constraint {
    /// Index of the agent that the constraint applies to.
    pub agent: usize,
    /// The forbidden polygons.
    pub polygons: SmallVec<[Footprint; 1]>,
    /// When the polygons are forbidden. Closed on both ends.
    pub window: TimeWindow,
}

impl Constraint {
    /// Whether a footprint occupied at the given time violates this
    /// constraint.
    pub fn violated_by(&self, footprint: &Footprint, time: TimePoint) -> bool {
        self.window.contains(time) && self.polygons.iter().any(|p| p.intersects(footprint))
    }
}

/// A window of time during which two agents' footprints overlap. The
/// footprints are captured at the first overlapping sample.
#[derive(Clone, Debug)]
pub struct Conflict {
    /// The pair of agents involved, always ordered so that `agents.0 <
    /// agents.1`.
    pub agents: (usize, usize),
    pub footprints: (Footprint, Footprint),
    pub window: TimeWindow,
}

/// Scan a joint plan for its earliest pairwise conflict.
///
/// Every trajectory is first resampled to the shared propagation step, then
/// the sample index k advances from zero. The first colliding pair opens a
/// window that extends while both agents still exist and still collide; the
/// scan stops at that single conflict. Later conflicts would be discarded
/// by the caller anyway, since the constraint tree branches on one conflict
/// at a time. Ties at the same k break toward the smallest (i, j) pair so
/// that identical inputs always produce identical search trees.
///
/// An agent whose trajectory has already ended is absent from the scan at
/// that index: reaching its goal does not generate phantom collisions.
pub fn find_first_conflict<S, C>(
    plan: &[Arc<Trajectory<S, C>>],
    agents: &[Agent<S, C>],
) -> Option<Conflict>
where
    S: Positioned + Oriented + Clone,
    C: Clone,
{
    if plan.len() < 2 {
        return None;
    }

    let delta = agents[0].propagator.step_size();
    let resampled: Vec<_> = plan
        .iter()
        .zip(agents)
        .map(|(trajectory, agent)| trajectory.resample(agent.propagator.as_ref()))
        .collect();
    let footprint =
        |i: usize, k: usize| Footprint::of(&resampled[i].states()[k], &agents[i].profile);
    let sample_time = |k: usize| TimePoint::new(k as i64 * delta.nanos);

    let max_states = resampled.iter().map(|t| t.state_count()).max().unwrap_or(0);
    for k in 0..max_states {
        for i in 0..resampled.len() {
            if k >= resampled[i].state_count() {
                continue;
            }
            for j in (i + 1)..resampled.len() {
                if k >= resampled[j].state_count() {
                    continue;
                }
                let f_i = footprint(i, k);
                let f_j = footprint(j, k);
                if !f_i.intersects(&f_j) {
                    continue;
                }

                let mut end = k;
                let mut next = k + 1;
                while next < resampled[i].state_count()
                    && next < resampled[j].state_count()
                    && footprint(i, next).intersects(&footprint(j, next))
                {
                    end = next;
                    next += 1;
                }

                return Some(Conflict {
                    agents: (i, j),
                    footprints: (f_i, f_j),
                    window: TimeWindow::new(sample_time(k), sample_time(end)),
                });
            }
        }
    }

    None
}
