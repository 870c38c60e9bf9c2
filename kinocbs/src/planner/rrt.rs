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

use crate::domain::{Agent, DirectedControlSampler, GoalRegion, Propagator, StateSpace, Steered};
use crate::motion::{Duration, Footprint, Oriented, Positioned, TimePoint, Trajectory};
use crate::planner::halt::Halt;
use crate::search::conflict::Constraint;
use crate::util::Minimum;
use float_ord::FloatOrd;
use rand::{Rng, RngCore};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// One node of the planning tree. Parent links are integer indices into the
/// arena, which keeps the tree acyclic by construction and lets the whole
/// structure be reclaimed in one deallocation when the planner is dropped.
#[derive(Clone, Debug)]
pub struct Motion<S, C> {
    pub state: S,
    /// The control that was applied at the parent to reach this state. The
    /// root carries no control.
    pub control: Option<C>,
    /// How many propagation steps the control was applied for.
    pub steps: u32,
    pub parent: Option<usize>,
    /// Propagation steps accumulated along the path from the root. The
    /// absolute time of this motion is this count times the step size.
    pub elapsed_steps: u64,
}

/// The growing state of a [`ConstraintRrt`], visible to halting conditions.
#[derive(Debug, Default)]
pub struct RrtMemory<S, C> {
    pub arena: Vec<Motion<S, C>>,
}

/// An edge of the planning tree, reported for introspection after a solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeEdge {
    pub parent: usize,
    pub child: usize,
    pub steps: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct RrtConfig {
    /// Probability of steering toward a goal sample instead of a uniform
    /// sample on any given iteration.
    pub goal_bias: f64,
    /// When set, every propagated substate becomes its own tree node of one
    /// step each. Planning behavior is otherwise identical.
    pub add_intermediate_states: bool,
}

impl Default for RrtConfig {
    fn default() -> Self {
        Self {
            goal_bias: 0.05,
            add_intermediate_states: false,
        }
    }
}

/// The outcome of one planning attempt. When the budget expires before a
/// goal state is accepted, the trajectory leads to the tree node closest to
/// the goal and `exact` is false.
#[derive(Clone, Debug)]
pub struct PlannedPath<S, C> {
    pub trajectory: Trajectory<S, C>,
    pub exact: bool,
    /// The goal region's reported distance at the trajectory's final state.
    pub goal_distance: f64,
}

type GoalMin = Minimum<
    (FloatOrd<f64>, usize),
    fn(&(FloatOrd<f64>, usize), &(FloatOrd<f64>, usize)) -> Ordering,
>;

fn by_distance(a: &(FloatOrd<f64>, usize), b: &(FloatOrd<f64>, usize)) -> Ordering {
    a.0.cmp(&b.0)
}

/// A control-space rapidly-exploring random tree that rejects any extension
/// violating a time-windowed spatial constraint.
///
/// The constraint list must already be filtered to the agent being planned
/// for. A motion at absolute time t is rejected when any constraint whose
/// window contains t has a polygon overlapping the agent's footprint at the
/// motion's state. Times are exact multiples of the propagation step, so
/// window membership never depends on floating-point drift.
pub struct ConstraintRrt<'a, S, C> {
    agent: &'a Agent<S, C>,
    constraints: Vec<Arc<Constraint>>,
    config: RrtConfig,
    memory: RrtMemory<S, C>,
}

impl<'a, S, C> ConstraintRrt<'a, S, C>
where
    S: Positioned + Oriented + Clone,
    C: Clone,
{
    pub fn new(
        agent: &'a Agent<S, C>,
        constraints: Vec<Arc<Constraint>>,
        config: RrtConfig,
    ) -> Self {
        Self {
            agent,
            constraints,
            config,
            memory: RrtMemory { arena: Vec::new() },
        }
    }

    /// Grow the tree until a goal state is accepted or the halting condition
    /// trips. The tree never removes nodes; it is reclaimed when the planner
    /// is dropped.
    pub fn plan(
        &mut self,
        rng: &mut dyn RngCore,
        halt: &mut impl Halt<RrtMemory<S, C>>,
    ) -> PlannedPath<S, C> {
        if !self.constraints.is_empty() {
            debug!(
                agent = %self.agent.name,
                constraints = self.constraints.len(),
                "planning under constraints"
            );
        }

        let delta = self.agent.propagator.step_size();
        self.memory.arena.clear();
        self.memory.arena.push(Motion {
            state: self.agent.start.clone(),
            control: None,
            steps: 0,
            parent: None,
            elapsed_steps: 0,
        });

        let mut nearest_goal: GoalMin = Minimum::new(by_distance);
        nearest_goal.consider_take((FloatOrd(self.agent.goal.distance(&self.agent.start)), 0));

        let mut solution = None;
        if self.agent.goal.is_satisfied(&self.agent.start) {
            solution = Some(0);
        }

        while solution.is_none() && !halt.halt(&self.memory) {
            let target = if rng.gen::<f64>() < self.config.goal_bias {
                match self.agent.goal.sample_goal(rng) {
                    Some(state) => state,
                    None => self.agent.space.sample_uniform(rng),
                }
            } else {
                self.agent.space.sample_uniform(rng)
            };

            let nearest = self.nearest_to(&target);
            let steered =
                self.agent
                    .steering
                    .sample_towards(rng, &self.memory.arena[nearest].state, &target);
            if steered.steps < self.agent.propagator.min_control_duration() {
                continue;
            }

            if self.config.add_intermediate_states {
                solution = self.extend_each_step(nearest, steered, delta, &mut nearest_goal);
            } else {
                solution = self.extend(nearest, steered, delta, &mut nearest_goal);
            }
        }

        let (node, exact) = match solution {
            Some(node) => (node, true),
            None => (nearest_goal.result().unwrap().1, false),
        };
        let trajectory = self.reconstruct(node, delta);
        let goal_distance = self.agent.goal.distance(&self.memory.arena[node].state);
        PlannedPath {
            trajectory,
            exact,
            goal_distance,
        }
    }

    /// The edges of the grown tree, for debugging and visualization.
    pub fn tree_edges(&self) -> Vec<TreeEdge> {
        self.memory
            .arena
            .iter()
            .enumerate()
            .filter_map(|(child, motion)| {
                motion.parent.map(|parent| TreeEdge {
                    parent,
                    child,
                    steps: motion.steps,
                })
            })
            .collect()
    }

    fn nearest_to(&self, target: &S) -> usize {
        let mut nearest: GoalMin = Minimum::new(by_distance);
        for (id, motion) in self.memory.arena.iter().enumerate() {
            nearest.consider_take((
                FloatOrd(self.agent.space.distance(&motion.state, target)),
                id,
            ));
        }
        nearest.result().unwrap().1
    }

    fn permitted(&self, state: &S, time: TimePoint) -> bool {
        if self.constraints.is_empty() {
            return true;
        }
        let footprint = Footprint::of(state, &self.agent.profile);
        self.constraints
            .iter()
            .all(|c| !c.violated_by(&footprint, time))
    }

    /// Attach one motion covering the whole steered extension. Returns the
    /// new node when it lands in the goal region.
    fn extend(
        &mut self,
        parent: usize,
        steered: Steered<S, C>,
        delta: Duration,
        nearest_goal: &mut GoalMin,
    ) -> Option<usize> {
        let elapsed = self.memory.arena[parent].elapsed_steps + steered.steps as u64;
        let time = TimePoint::new(elapsed as i64 * delta.nanos);
        if !self.permitted(&steered.state, time) {
            return None;
        }

        let id = self.memory.arena.len();
        let distance = self.agent.goal.distance(&steered.state);
        let satisfied = self.agent.goal.is_satisfied(&steered.state);
        self.memory.arena.push(Motion {
            state: steered.state,
            control: Some(steered.control),
            steps: steered.steps,
            parent: Some(parent),
            elapsed_steps: elapsed,
        });
        nearest_goal.consider_take((FloatOrd(distance), id));
        satisfied.then_some(id)
    }

    /// Attach every propagated substate as its own one-step node. The
    /// extension stops early at the first substate that violates a
    /// constraint or leaves the valid region; earlier substates remain in
    /// the tree.
    fn extend_each_step(
        &mut self,
        parent: usize,
        steered: Steered<S, C>,
        delta: Duration,
        nearest_goal: &mut GoalMin,
    ) -> Option<usize> {
        let mut parent = parent;
        let mut cursor = self.memory.arena[parent].state.clone();
        for _ in 0..steered.steps {
            let propagated = self.agent.propagator.propagate(&cursor, &steered.control, 1);
            if propagated.valid_steps < 1 {
                break;
            }
            cursor = propagated.state;

            let elapsed = self.memory.arena[parent].elapsed_steps + 1;
            let time = TimePoint::new(elapsed as i64 * delta.nanos);
            if !self.permitted(&cursor, time) {
                break;
            }

            let id = self.memory.arena.len();
            let distance = self.agent.goal.distance(&cursor);
            let satisfied = self.agent.goal.is_satisfied(&cursor);
            self.memory.arena.push(Motion {
                state: cursor.clone(),
                control: Some(steered.control.clone()),
                steps: 1,
                parent: Some(parent),
                elapsed_steps: elapsed,
            });
            nearest_goal.consider_take((FloatOrd(distance), id));
            if satisfied {
                return Some(id);
            }
            parent = id;
        }
        None
    }

    fn reconstruct(&self, node: usize, delta: Duration) -> Trajectory<S, C> {
        let mut chain = Vec::new();
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            chain.push(id);
            cursor = self.memory.arena[id].parent;
        }
        chain.reverse();

        let mut states = Vec::with_capacity(chain.len());
        let mut controls = Vec::with_capacity(chain.len().saturating_sub(1));
        let mut durations = Vec::with_capacity(chain.len().saturating_sub(1));
        for id in chain {
            let motion = &self.memory.arena[id];
            states.push(motion.state.clone());
            if let Some(control) = &motion.control {
                controls.push(control.clone());
                durations.push(Duration::new(motion.steps as i64 * delta.nanos));
            }
        }

        // The chain pairs one control with every non-root motion, so the
        // counts cannot be malformed.
        Trajectory::from_parts(states, controls, durations).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::{Point, RectangularProfile, TimeWindow};
    use crate::planner::halt::StepLimit;
    use crate::premade::{car_agent, Bounds, CarControl, CarState, DiscGoal};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use smallvec::SmallVec;

    const DT: f64 = 0.1;

    fn corridor_agent() -> Agent<CarState, CarControl> {
        car_agent(
            "car",
            RectangularProfile::new(1.0, 1.0),
            CarState::new(0.0, 0.0, 0.0),
            DiscGoal::new(4.0, 0.0, 0.5),
            Bounds::new(-2.0, 6.0, -3.0, 3.0),
            DT,
        )
    }

    fn solve(
        planner: &mut ConstraintRrt<'_, CarState, CarControl>,
        seed: u64,
        iterations: usize,
    ) -> PlannedPath<CarState, CarControl> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut halt = StepLimit::new(Some(iterations));
        planner.plan(&mut rng, &mut halt)
    }

    #[test]
    fn unconstrained_planning_reaches_the_goal() {
        let agent = corridor_agent();
        let mut planner = ConstraintRrt::new(&agent, Vec::new(), RrtConfig::default());
        let path = solve(&mut planner, 7, 20_000);
        assert!(path.exact);
        assert_eq!(*path.trajectory.initial(), agent.start);
        assert!(agent.goal.is_satisfied(path.trajectory.finish()));
        assert!(path.goal_distance <= 0.0);
    }

    #[test]
    fn planning_is_deterministic_for_a_fixed_seed() {
        let agent = corridor_agent();
        let mut a = ConstraintRrt::new(&agent, Vec::new(), RrtConfig::default());
        let mut b = ConstraintRrt::new(&agent, Vec::new(), RrtConfig::default());
        let first = solve(&mut a, 21, 20_000);
        let second = solve(&mut b, 21, 20_000);
        assert_eq!(first.trajectory, second.trajectory);
        assert_eq!(first.exact, second.exact);
    }

    #[test]
    fn every_control_respects_the_minimum_duration() {
        let agent = corridor_agent();
        let mut planner = ConstraintRrt::new(&agent, Vec::new(), RrtConfig::default());
        let path = solve(&mut planner, 3, 20_000);
        let min = agent.propagator.min_control_duration() as i64;
        let delta = agent.propagator.step_size();
        for duration in path.trajectory.durations() {
            assert!(duration.nanos >= min * delta.nanos);
        }
    }

    #[test]
    fn a_fully_blocked_workspace_only_yields_an_approximate_path() {
        let agent = corridor_agent();
        let everywhere = Footprint::from_pose(
            Point::new(2.0, 0.0),
            0.0,
            &RectangularProfile::new(1000.0, 1000.0),
        );
        let constraint = Arc::new(Constraint {
            agent: 0,
            polygons: SmallVec::from_iter([everywhere]),
            window: TimeWindow::new(TimePoint::new(0), TimePoint::new(i64::MAX)),
        });
        let mut planner = ConstraintRrt::new(&agent, vec![constraint], RrtConfig::default());
        let path = solve(&mut planner, 5, 500);
        assert!(!path.exact);
        assert_eq!(path.trajectory.state_count(), 1);
        assert_eq!(*path.trajectory.finish(), agent.start);
    }

    #[test]
    fn constrained_plans_avoid_the_forbidden_region() {
        let agent = corridor_agent();
        // A wall across the direct corridor for the first hundred seconds.
        let wall = Footprint::from_pose(
            Point::new(2.0, 0.0),
            0.0,
            &RectangularProfile::new(0.5, 3.0),
        );
        let constraint = Arc::new(Constraint {
            agent: 0,
            polygons: SmallVec::from_iter([wall]),
            window: TimeWindow::new(TimePoint::new(0), TimePoint::new(100_000_000_000)),
        });
        let config = RrtConfig {
            add_intermediate_states: true,
            ..RrtConfig::default()
        };
        let mut planner = ConstraintRrt::new(&agent, vec![constraint.clone()], config);
        let path = solve(&mut planner, 11, 50_000);
        assert!(path.exact);

        // Every node is one step long, so the trajectory samples the
        // constraint at every multiple of the step size.
        let delta = agent.propagator.step_size();
        for (k, state) in path.trajectory.states().iter().enumerate() {
            let time = TimePoint::new(k as i64 * delta.nanos);
            let footprint = Footprint::of(state, &agent.profile);
            assert!(!constraint.violated_by(&footprint, time));
        }
    }

    #[test]
    fn tree_edges_reference_valid_parents() {
        let agent = corridor_agent();
        let mut planner = ConstraintRrt::new(&agent, Vec::new(), RrtConfig::default());
        let _ = solve(&mut planner, 13, 2_000);
        let edges = planner.tree_edges();
        assert!(!edges.is_empty());
        for edge in &edges {
            assert!(edge.parent < edge.child);
            assert!(edge.steps >= 1);
        }
    }

    #[test]
    fn a_start_inside_the_goal_region_is_an_immediate_solution() {
        let agent = car_agent(
            "done",
            RectangularProfile::new(1.0, 1.0),
            CarState::new(4.0, 0.0, 0.0),
            DiscGoal::new(4.0, 0.0, 0.5),
            Bounds::new(-2.0, 6.0, -3.0, 3.0),
            DT,
        );
        let mut planner = ConstraintRrt::new(&agent, Vec::new(), RrtConfig::default());
        let path = solve(&mut planner, 1, 10);
        assert!(path.exact);
        assert_eq!(path.trajectory.state_count(), 1);
    }
}
