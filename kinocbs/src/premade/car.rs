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

//! A ready-to-use velocity-controlled vehicle model so that a fleet can be
//! planned for without writing any dynamics code. The state is an SE(2)
//! configuration, the control commands a forward speed and a turn rate, and
//! propagation is explicit Euler integration at the shared step size.

use crate::domain::{
    Agent, DirectedControlSampler, GoalRegion, Propagation, Propagator, StateSpace, Steered,
};
use crate::motion::se2::wrap_angle;
use crate::motion::{Duration, Oriented, Point, Positioned, RectangularProfile, Vector};
use crate::util::Minimum;
use float_ord::FloatOrd;
use rand::{Rng, RngCore};
use std::f64::consts::PI;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CarState {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

impl CarState {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw }
    }
}

impl Positioned for CarState {
    fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

impl Oriented for CarState {
    fn yaw(&self) -> f64 {
        self.yaw
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CarControl {
    /// Forward speed in units per second. Negative values reverse.
    pub speed: f64,
    /// Heading rate in radians per second.
    pub turn_rate: f64,
}

impl CarControl {
    pub fn new(speed: f64, turn_rate: f64) -> Self {
        Self { speed, turn_rate }
    }
}

/// An axis-aligned rectangle of valid center positions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vector,
    pub max: Vector,
}

impl Bounds {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            min: Vector::new(x_min, y_min),
            max: Vector::new(x_max, y_max),
        }
    }

    pub fn contains(&self, point: &Point) -> bool {
        self.min.x <= point.x && point.x <= self.max.x && self.min.y <= point.y && point.y <= self.max.y
    }
}

/// Unicycle dynamics integrated at a fixed step. Propagation stops at the
/// first step that would carry the center outside the workspace bounds.
pub struct CarDynamics {
    bounds: Bounds,
    step: Duration,
    step_seconds: f64,
    min_control_duration: u32,
    max_control_duration: u32,
}

impl CarDynamics {
    pub fn new(
        bounds: Bounds,
        time_step: f64,
        min_control_duration: u32,
        max_control_duration: u32,
    ) -> Self {
        Self {
            bounds,
            step: Duration::from_secs_f64(time_step),
            step_seconds: time_step,
            min_control_duration,
            max_control_duration,
        }
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }
}

impl Propagator<CarState, CarControl> for CarDynamics {
    fn step_size(&self) -> Duration {
        self.step
    }

    fn min_control_duration(&self) -> u32 {
        self.min_control_duration
    }

    fn max_control_duration(&self) -> u32 {
        self.max_control_duration
    }

    fn propagate(&self, from: &CarState, control: &CarControl, steps: u32) -> Propagation<CarState> {
        let dt = self.step_seconds;
        let mut state = *from;
        let mut valid_steps = 0;
        for _ in 0..steps {
            let next = CarState {
                x: state.x + control.speed * state.yaw.cos() * dt,
                y: state.y + control.speed * state.yaw.sin() * dt,
                yaw: wrap_angle(state.yaw + control.turn_rate * dt),
            };
            if !self.bounds.contains(&next.point()) {
                break;
            }
            state = next;
            valid_steps += 1;
        }
        Propagation { state, valid_steps }
    }
}

/// Uniform sampling over the workspace bounds with free heading, and a
/// distance that blends planar separation with heading separation.
pub struct CarStateSpace {
    bounds: Bounds,
    yaw_weight: f64,
}

impl CarStateSpace {
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            yaw_weight: 0.5,
        }
    }
}

impl StateSpace<CarState> for CarStateSpace {
    fn sample_uniform(&self, rng: &mut dyn RngCore) -> CarState {
        CarState {
            x: rng.gen_range(self.bounds.min.x..self.bounds.max.x),
            y: rng.gen_range(self.bounds.min.y..self.bounds.max.y),
            yaw: rng.gen_range(-PI..PI),
        }
    }

    fn distance(&self, a: &CarState, b: &CarState) -> f64 {
        let planar = (a.point() - b.point()).norm();
        let angular = wrap_angle(a.yaw - b.yaw).abs();
        planar + self.yaw_weight * angular
    }
}

/// Steers by drawing several random controls and durations, propagating
/// each, and keeping whichever candidate ends closest to the target.
pub struct CarSteering {
    dynamics: Arc<CarDynamics>,
    space: Arc<CarStateSpace>,
    max_speed: f64,
    max_turn_rate: f64,
    samples: usize,
}

impl CarSteering {
    pub fn new(
        dynamics: Arc<CarDynamics>,
        space: Arc<CarStateSpace>,
        max_speed: f64,
        max_turn_rate: f64,
        samples: usize,
    ) -> Self {
        Self {
            dynamics,
            space,
            max_speed,
            max_turn_rate,
            samples,
        }
    }
}

impl DirectedControlSampler<CarState, CarControl> for CarSteering {
    fn sample_towards(
        &self,
        rng: &mut dyn RngCore,
        from: &CarState,
        target: &CarState,
    ) -> Steered<CarState, CarControl> {
        let mut best = Minimum::new(
            |a: &(FloatOrd<f64>, Steered<CarState, CarControl>),
             b: &(FloatOrd<f64>, Steered<CarState, CarControl>)| a.0.cmp(&b.0),
        );
        for _ in 0..self.samples.max(1) {
            let control = CarControl {
                speed: rng.gen_range(-self.max_speed..self.max_speed),
                turn_rate: rng.gen_range(-self.max_turn_rate..self.max_turn_rate),
            };
            let steps = rng.gen_range(
                self.dynamics.min_control_duration()..=self.dynamics.max_control_duration(),
            );
            let propagated = self.dynamics.propagate(from, &control, steps);
            let candidate = Steered {
                control,
                steps: propagated.valid_steps,
                state: propagated.state,
            };
            best.consider_take((FloatOrd(self.space.distance(&candidate.state, target)), candidate));
        }
        best.result().unwrap().1
    }
}

/// A disc of acceptable final positions with free heading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiscGoal {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

impl DiscGoal {
    pub fn new(x: f64, y: f64, radius: f64) -> Self {
        Self { x, y, radius }
    }

    fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

impl GoalRegion<CarState> for DiscGoal {
    fn is_satisfied(&self, state: &CarState) -> bool {
        (state.point() - self.center()).norm() <= self.radius
    }

    fn distance(&self, state: &CarState) -> f64 {
        (state.point() - self.center()).norm() - self.radius
    }

    fn sample_goal(&self, rng: &mut dyn RngCore) -> Option<CarState> {
        let radius = self.radius * rng.gen_range(0.0..1.0f64).sqrt();
        let angle = rng.gen_range(-PI..PI);
        Some(CarState {
            x: self.x + radius * angle.cos(),
            y: self.y + radius * angle.sin(),
            yaw: rng.gen_range(-PI..PI),
        })
    }
}

/// Assemble a complete car agent from a start pose, a goal disc, and the
/// workspace bounds. All agents built with the same `time_step` share the
/// same propagation quantum, which the joint solver requires.
pub fn car_agent(
    name: &str,
    profile: RectangularProfile,
    start: CarState,
    goal: DiscGoal,
    bounds: Bounds,
    time_step: f64,
) -> Agent<CarState, CarControl> {
    let dynamics = Arc::new(CarDynamics::new(bounds, time_step, 1, 10));
    let space = Arc::new(CarStateSpace::new(bounds));
    let steering = Arc::new(CarSteering::new(dynamics.clone(), space.clone(), 1.0, 1.0, 8));
    Agent {
        name: name.to_owned(),
        profile,
        start,
        space,
        propagator: dynamics,
        steering,
        goal: Arc::new(goal),
    }
}
