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

pub mod conflict;
pub use conflict::{find_first_conflict, Conflict, Constraint};

use crate::domain::{Agent, Propagator};
use crate::error::ThisError;
use crate::motion::{Duration, Footprint, Oriented, Positioned, Trajectory};
use crate::planner::halt::{Halt, StepLimit, TimeLimit};
use crate::planner::rrt::{ConstraintRrt, PlannedPath, RrtConfig};
use crate::scenario::ProblemSet;
use crate::util::triangular_for;
use rand::rngs::StdRng;
use rand::SeedableRng;
use smallvec::SmallVec;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;
use tracing::{debug, info};

/// One node of the constraint tree: a joint plan, the constraints it was
/// planned under, and the cost that orders it in the frontier. Constraint
/// lists only ever grow along a root-to-node path.
#[derive(Clone, Debug)]
pub struct ConflictNode<S, C> {
    /// One trajectory per agent, indexed by the agent's slot.
    pub plan: Vec<Arc<Trajectory<S, C>>>,
    pub constraints: Vec<Arc<Constraint>>,
    /// Sum of the per-agent trajectory durations.
    pub cost: Duration,
    pub parent: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct QueueTicket {
    evaluation: i64,
    /// Monotone insertion counter, so that equal-cost nodes come out of the
    /// frontier in the order they went in.
    order: u64,
    node_id: usize,
}

impl PartialEq for QueueTicket {
    fn eq(&self, other: &Self) -> bool {
        self.evaluation == other.evaluation && self.order == other.order
    }
}

impl Eq for QueueTicket {}

impl PartialOrd for QueueTicket {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueTicket {
    fn cmp(&self, other: &Self) -> Ordering {
        self.evaluation
            .cmp(&other.evaluation)
            .then(self.order.cmp(&other.order))
    }
}

/// The memory arena and frontier of the high-level search. Nodes are never
/// removed; a popped node that still has a conflict becomes the parent of
/// its children and is never re-expanded.
#[derive(Debug)]
pub struct SearchMemory<S, C> {
    pub arena: Vec<ConflictNode<S, C>>,
    queue: BinaryHeap<Reverse<QueueTicket>>,
    next_order: u64,
}

impl<S, C> SearchMemory<S, C> {
    pub fn new() -> Self {
        Self {
            arena: Vec::new(),
            queue: BinaryHeap::new(),
            next_order: 0,
        }
    }

    pub fn push(&mut self, node: ConflictNode<S, C>) -> usize {
        let node_id = self.arena.len();
        let evaluation = node.cost.nanos;
        self.arena.push(node);
        let ticket = QueueTicket {
            evaluation,
            order: self.next_order,
            node_id,
        };
        self.next_order += 1;
        self.queue.push(Reverse(ticket));
        node_id
    }

    pub fn pop(&mut self) -> Option<usize> {
        self.queue.pop().map(|Reverse(ticket)| ticket.node_id)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
}

impl<S, C> Default for SearchMemory<S, C> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Nodes popped from the frontier and checked for conflicts.
    pub expanded: usize,
    /// Children that survived replanning and entered the frontier.
    pub spawned: usize,
    /// Children discarded because their replanned trajectory was not exact.
    pub dropped: usize,
    /// Invocations of the low-level planner, including the root plans.
    pub low_level_calls: usize,
}

/// What a solve produced. `approximate` is always false here: approximate
/// results are a low-level planner concept that never propagates up to the
/// joint search.
#[derive(Debug)]
pub struct SolveReport<S, C> {
    pub solved: bool,
    pub approximate: bool,
    pub stats: SearchStats,
    /// The full constraint tree that the search grew, for introspection.
    pub memory: SearchMemory<S, C>,
}

#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("no agents were provided")]
    NoAgents,
    #[error("agents advertise different propagation step sizes")]
    MismatchedStepSize,
    #[error("the start footprints of agents {0} and {1} overlap")]
    ConflictingStarts(String, String),
    #[error("no valid start: agent {0} has no exact initial trajectory")]
    NoValidStart(String),
}

#[derive(Clone, Copy, Debug)]
pub struct KdCbsConfig {
    /// Wall-clock budget of each low-level planning invocation, in seconds.
    pub planning_time: f64,
    /// Optional iteration cap on each low-level planning invocation. Useful
    /// for fully reproducible runs.
    pub max_rrt_iterations: Option<usize>,
    /// Goal bias handed to the low-level planner.
    pub goal_bias: f64,
    /// Whether the low-level planner records every propagated substate as a
    /// tree node.
    pub add_intermediate_states: bool,
    /// Seed of the random number generator that drives every low-level
    /// invocation of a solve.
    pub seed: u64,
}

impl Default for KdCbsConfig {
    fn default() -> Self {
        Self {
            planning_time: 5.0,
            max_rrt_iterations: None,
            goal_bias: 0.05,
            add_intermediate_states: false,
            seed: 0,
        }
    }
}

/// Kinodynamic conflict-based search: a best-first search over a tree of
/// constraint sets, with a constraint-respecting sampling-based planner
/// producing each single-agent trajectory.
///
/// The solve loop is single-threaded and sequential; the caller's halting
/// condition is polled at every expansion and between child replans, and is
/// the only cancellation point. Given a fixed seed and halting condition,
/// the entire search is deterministic.
pub struct KdCbs<S, C> {
    agents: Vec<Agent<S, C>>,
    config: KdCbsConfig,
}

impl<S, C> KdCbs<S, C>
where
    S: Positioned + Oriented + Clone,
    C: Clone,
{
    pub fn new(agents: Vec<Agent<S, C>>, config: KdCbsConfig) -> Self {
        Self { agents, config }
    }

    pub fn agents(&self) -> &[Agent<S, C>] {
        &self.agents
    }

    /// Plan the whole fleet. On success the solved trajectories are appended
    /// to `problem` under each agent's name. Exhausting the frontier or
    /// tripping the halting condition reports `solved: false` without an
    /// error; only configuration problems abort the solve.
    pub fn solve(
        &self,
        problem: &mut ProblemSet<S, C>,
        halt: &mut impl Halt<SearchMemory<S, C>>,
    ) -> Result<SolveReport<S, C>, SetupError> {
        self.check_setup()?;

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut stats = SearchStats::default();
        let mut memory = SearchMemory::new();
        info!(agents = self.agents.len(), "starting joint plan search");

        let mut root_plan = Vec::with_capacity(self.agents.len());
        for agent in &self.agents {
            let path = self.replan(agent, Vec::new(), &mut rng, &mut stats);
            if !path.exact {
                info!(agent = %agent.name, "no valid start");
                return Err(SetupError::NoValidStart(agent.name.clone()));
            }
            root_plan.push(Arc::new(path.trajectory));
        }
        let cost = plan_cost(&root_plan);
        memory.push(ConflictNode {
            plan: root_plan,
            constraints: Vec::new(),
            cost,
            parent: None,
        });

        loop {
            if halt.halt(&memory) {
                info!("halted before finding a conflict-free plan");
                return Ok(self.report(false, stats, memory));
            }
            let id = match memory.pop() {
                Some(id) => id,
                None => {
                    info!("constraint tree exhausted without a solution");
                    return Ok(self.report(false, stats, memory));
                }
            };
            stats.expanded += 1;

            let found = match find_first_conflict(&memory.arena[id].plan, &self.agents) {
                Some(found) => found,
                None => {
                    for (agent, trajectory) in self.agents.iter().zip(&memory.arena[id].plan) {
                        problem.insert_solution(agent.name.clone(), (**trajectory).clone());
                    }
                    info!(expanded = stats.expanded, "found a conflict-free joint plan");
                    return Ok(self.report(true, stats, memory));
                }
            };

            let (first, second) = found.agents;
            debug!(
                first = %self.agents[first].name,
                second = %self.agents[second].name,
                from = found.window.start.as_secs_f64(),
                until = found.window.end.as_secs_f64(),
                "branching on a conflict"
            );

            let parent_plan = memory.arena[id].plan.clone();
            let parent_constraints = memory.arena[id].constraints.clone();
            let branches = [
                (first, found.footprints.1.clone()),
                (second, found.footprints.0.clone()),
            ];
            for (constrained, against) in branches {
                if halt.halt(&memory) {
                    info!("halted before finding a conflict-free plan");
                    return Ok(self.report(false, stats, memory));
                }

                let mut constraints = parent_constraints.clone();
                constraints.push(Arc::new(Constraint {
                    agent: constrained,
                    polygons: SmallVec::from_iter([against]),
                    window: found.window,
                }));
                let own: Vec<Arc<Constraint>> = constraints
                    .iter()
                    .filter(|c| c.agent == constrained)
                    .cloned()
                    .collect();

                let path = self.replan(&self.agents[constrained], own, &mut rng, &mut stats);
                if !path.exact {
                    stats.dropped += 1;
                    debug!(
                        agent = %self.agents[constrained].name,
                        "dropping a child whose replan was not exact"
                    );
                    continue;
                }

                let mut plan = parent_plan.clone();
                plan[constrained] = Arc::new(path.trajectory);
                let cost = plan_cost(&plan);
                memory.push(ConflictNode {
                    plan,
                    constraints,
                    cost,
                    parent: Some(id),
                });
                stats.spawned += 1;
            }
        }
    }

    fn check_setup(&self) -> Result<(), SetupError> {
        if self.agents.is_empty() {
            return Err(SetupError::NoAgents);
        }

        let delta = self.agents[0].propagator.step_size();
        for agent in &self.agents[1..] {
            if agent.propagator.step_size().nanos != delta.nanos {
                return Err(SetupError::MismatchedStepSize);
            }
        }

        // Two agents whose footprints already overlap at their starts would
        // conflict at the very first sample of every joint plan, so no
        // amount of searching could separate them.
        let mut clash = None;
        triangular_for(self.agents.iter(), |a, b| {
            if clash.is_some() {
                return;
            }
            let f_a = Footprint::of(&a.start, &a.profile);
            let f_b = Footprint::of(&b.start, &b.profile);
            if f_a.intersects(&f_b) {
                clash = Some((a.name.clone(), b.name.clone()));
            }
        });
        if let Some((a, b)) = clash {
            return Err(SetupError::ConflictingStarts(a, b));
        }

        Ok(())
    }

    fn replan(
        &self,
        agent: &Agent<S, C>,
        constraints: Vec<Arc<Constraint>>,
        rng: &mut StdRng,
        stats: &mut SearchStats,
    ) -> PlannedPath<S, C> {
        stats.low_level_calls += 1;
        let config = RrtConfig {
            goal_bias: self.config.goal_bias,
            add_intermediate_states: self.config.add_intermediate_states,
        };
        let mut planner = ConstraintRrt::new(agent, constraints, config);
        let mut budget = (
            TimeLimit::from_secs_f64(self.config.planning_time),
            StepLimit::new(self.config.max_rrt_iterations),
        );
        planner.plan(rng, &mut budget)
    }

    fn report(
        &self,
        solved: bool,
        stats: SearchStats,
        memory: SearchMemory<S, C>,
    ) -> SolveReport<S, C> {
        SolveReport {
            solved,
            approximate: false,
            stats,
            memory,
        }
    }
}

fn plan_cost<S, C>(plan: &[Arc<Trajectory<S, C>>]) -> Duration {
    Duration::new(plan.iter().map(|t| t.duration().nanos).sum())
}
