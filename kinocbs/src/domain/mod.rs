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

use crate::motion::{Duration, RectangularProfile};
use rand::RngCore;
use std::sync::Arc;

/// The outcome of integrating a control from a state.
#[derive(Clone, Debug)]
pub struct Propagation<S> {
    /// The state reached after the last valid step.
    pub state: S,
    /// How many of the requested steps stayed valid. Propagation stops at
    /// the first step that would leave the valid region, so this may be
    /// less than the number of steps requested.
    pub valid_steps: u32,
}

/// The dynamics of one vehicle, integrated at a fixed time quantum.
///
/// Implementations must be deterministic: propagating the same state and
/// control for the same number of steps always produces the same result.
pub trait Propagator<S, C> {
    /// The time quantum that one step integrates over. Every propagator in
    /// a joint planning problem must advertise the same step size.
    fn step_size(&self) -> Duration;

    /// The fewest steps a sampled control may be applied for.
    fn min_control_duration(&self) -> u32 {
        1
    }

    /// The most steps a sampled control may be applied for.
    fn max_control_duration(&self) -> u32;

    /// Integrate `steps` quanta of `control` starting from `from`.
    fn propagate(&self, from: &S, control: &C, steps: u32) -> Propagation<S>;
}

/// The configuration space of one vehicle.
pub trait StateSpace<S> {
    /// Draw a state uniformly from the space.
    fn sample_uniform(&self, rng: &mut dyn RngCore) -> S;

    /// The distance between two states, used to select the nearest tree
    /// node during planning.
    fn distance(&self, a: &S, b: &S) -> f64;
}

/// The result of steering from one state toward another.
#[derive(Clone, Debug)]
pub struct Steered<S, C> {
    pub control: C,
    /// How many propagation steps the control was applied for.
    pub steps: u32,
    /// The state reached by applying the control.
    pub state: S,
}

/// Samples controls that attempt to drive the system from one state toward
/// a target state.
pub trait DirectedControlSampler<S, C> {
    fn sample_towards(&self, rng: &mut dyn RngCore, from: &S, target: &S) -> Steered<S, C>;
}

/// A goal region with a membership test, a signed distance, and a sampler.
pub trait GoalRegion<S> {
    /// Whether the state lies inside the goal region.
    fn is_satisfied(&self, state: &S) -> bool;

    /// Distance from the state to the goal region. Negative inside.
    fn distance(&self, state: &S) -> f64;

    /// Draw a state from the goal region, if the region can be sampled.
    fn sample_goal(&self, rng: &mut dyn RngCore) -> Option<S>;
}

/// One vehicle of the fleet: its identity, rigid body, start configuration,
/// and the collaborators that describe its motion capabilities. Immutable
/// for the duration of a solve.
pub struct Agent<S, C> {
    pub name: String,
    pub profile: RectangularProfile,
    pub start: S,
    pub space: Arc<dyn StateSpace<S>>,
    pub propagator: Arc<dyn Propagator<S, C>>,
    pub steering: Arc<dyn DirectedControlSampler<S, C>>,
    pub goal: Arc<dyn GoalRegion<S>>,
}
