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

use crate::domain::Propagator;
use crate::error::ThisError;
use crate::motion::Duration;

#[derive(ThisError, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrajectoryError {
    #[error("a trajectory needs exactly one more state than it has controls")]
    CountMismatch,
    #[error("every control needs exactly one duration")]
    MissingDuration,
    #[error("control durations cannot be negative")]
    NegativeDuration,
}

/// A control-parameterized motion: states s0..sN, controls u0..u(N-1), and
/// per-control durations. The i-th control drives the i-th state to the
/// (i+1)-th state over the i-th duration.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory<S, C> {
    states: Vec<S>,
    controls: Vec<C>,
    durations: Vec<Duration>,
}

impl<S, C> Trajectory<S, C> {
    /// Assemble a trajectory, rejecting any set of parts whose counts or
    /// durations are malformed.
    pub fn from_parts(
        states: Vec<S>,
        controls: Vec<C>,
        durations: Vec<Duration>,
    ) -> Result<Self, TrajectoryError> {
        if states.len() != controls.len() + 1 {
            return Err(TrajectoryError::CountMismatch);
        }
        if durations.len() != controls.len() {
            return Err(TrajectoryError::MissingDuration);
        }
        if durations.iter().any(|d| d.nanos < 0) {
            return Err(TrajectoryError::NegativeDuration);
        }
        Ok(Self {
            states,
            controls,
            durations,
        })
    }

    /// Trajectories always have at least one state, so we can always get the
    /// first one.
    pub fn initial(&self) -> &S {
        self.states.first().unwrap()
    }

    pub fn finish(&self) -> &S {
        self.states.last().unwrap()
    }

    pub fn states(&self) -> &[S] {
        &self.states
    }

    pub fn controls(&self) -> &[C] {
        &self.controls
    }

    pub fn durations(&self) -> &[Duration] {
        &self.durations
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// The total time it takes to execute the trajectory.
    pub fn duration(&self) -> Duration {
        Duration::new(self.durations.iter().map(|d| d.nanos).sum())
    }
}

impl<S: Clone, C: Clone> Trajectory<S, C> {
    /// Rewrite the trajectory so that every control duration equals the
    /// propagator's step size. Segments already at or below one step are
    /// copied unchanged; longer segments are re-propagated one step at a
    /// time, emitting each intermediate state and replicating the control.
    /// The original segment endpoints are kept, so the result coincides
    /// with the input up to propagator determinism and never shrinks.
    pub fn resample(&self, propagator: &dyn Propagator<S, C>) -> Self {
        let delta = propagator.step_size();
        let mut states = Vec::with_capacity(self.states.len());
        let mut controls = Vec::with_capacity(self.controls.len());
        let mut durations = Vec::with_capacity(self.durations.len());

        for (i, control) in self.controls.iter().enumerate() {
            let duration = self.durations[i];
            let steps = (duration.nanos + delta.nanos / 2) / delta.nanos;
            states.push(self.states[i].clone());
            if steps <= 1 {
                controls.push(control.clone());
                durations.push(duration);
                continue;
            }

            // The segment endpoint is already in the path, so only the
            // intermediate states get emitted here.
            let mut cursor = self.states[i].clone();
            for _ in 1..steps {
                cursor = propagator.propagate(&cursor, control, 1).state;
                states.push(cursor.clone());
            }
            for _ in 0..steps {
                controls.push(control.clone());
                durations.push(delta);
            }
        }
        states.push(self.states[self.controls.len()].clone());

        Self {
            states,
            controls,
            durations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::premade::{Bounds, CarControl, CarDynamics, CarState};
    use approx::assert_relative_eq;

    fn test_dynamics() -> CarDynamics {
        CarDynamics::new(Bounds::new(-100.0, 100.0, -100.0, 100.0), 0.1, 1, 10)
    }

    fn drive(dynamics: &CarDynamics, from: CarState, control: CarControl, steps: u32) -> CarState {
        dynamics.propagate(&from, &control, steps).state
    }

    #[test]
    fn counts_are_validated_at_construction() {
        let s = CarState::new(0.0, 0.0, 0.0);
        let u = CarControl::new(1.0, 0.0);
        let d = Duration::from_secs_f64(0.1);
        assert_eq!(
            Trajectory::from_parts(vec![s, s], vec![u, u], vec![d, d]).err(),
            Some(TrajectoryError::CountMismatch),
        );
        assert_eq!(
            Trajectory::from_parts(vec![s, s], vec![u], vec![]).err(),
            Some(TrajectoryError::MissingDuration),
        );
        assert_eq!(
            Trajectory::from_parts(vec![s, s], vec![u], vec![Duration::new(-1)]).err(),
            Some(TrajectoryError::NegativeDuration),
        );
        assert!(Trajectory::from_parts(vec![s, s], vec![u], vec![d]).is_ok());
    }

    #[test]
    fn duration_sums_over_segments() {
        let s = CarState::new(0.0, 0.0, 0.0);
        let u = CarControl::new(1.0, 0.0);
        let trajectory = Trajectory::from_parts(
            vec![s, s, s],
            vec![u, u],
            vec![Duration::from_secs_f64(0.3), Duration::from_secs_f64(0.5)],
        )
        .unwrap();
        assert_relative_eq!(trajectory.duration().as_secs_f64(), 0.8, epsilon = 1e-9);
    }

    #[test]
    fn resampling_splits_long_segments() {
        let dynamics = test_dynamics();
        let start = CarState::new(0.0, 0.0, 0.0);
        let control = CarControl::new(1.0, 0.0);
        let end = drive(&dynamics, start, control, 5);
        let trajectory = Trajectory::from_parts(
            vec![start, end],
            vec![control],
            vec![Duration::from_secs_f64(0.5)],
        )
        .unwrap();

        let uniform = trajectory.resample(&dynamics);
        assert_eq!(uniform.state_count(), 6);
        assert_eq!(uniform.controls().len(), 5);
        for d in uniform.durations() {
            assert_eq!(d.nanos, dynamics.step_size().nanos);
        }
        for (k, state) in uniform.states().iter().enumerate() {
            assert_relative_eq!(state.x, 0.1 * k as f64, epsilon = 1e-9);
            assert_relative_eq!(state.y, 0.0);
        }
        assert_eq!(*uniform.finish(), end);
        assert_relative_eq!(
            uniform.duration().as_secs_f64(),
            trajectory.duration().as_secs_f64(),
            epsilon = 1e-9,
        );
    }

    #[test]
    fn short_segments_are_copied_unchanged() {
        let dynamics = test_dynamics();
        let start = CarState::new(0.0, 0.0, 0.0);
        let control = CarControl::new(1.0, 0.0);
        let end = drive(&dynamics, start, control, 1);
        let trajectory = Trajectory::from_parts(
            vec![start, end],
            vec![control],
            vec![Duration::from_secs_f64(0.1)],
        )
        .unwrap();

        let uniform = trajectory.resample(&dynamics);
        assert_eq!(uniform, trajectory);
    }

    #[test]
    fn resampling_is_idempotent() {
        let dynamics = test_dynamics();
        let control = CarControl::new(0.8, 0.5);
        let s0 = CarState::new(0.0, 0.0, 0.0);
        let s1 = drive(&dynamics, s0, control, 7);
        let other = CarControl::new(1.0, -0.2);
        let s2 = drive(&dynamics, s1, other, 3);
        let trajectory = Trajectory::from_parts(
            vec![s0, s1, s2],
            vec![control, other],
            vec![Duration::from_secs_f64(0.7), Duration::from_secs_f64(0.3)],
        )
        .unwrap();

        let once = trajectory.resample(&dynamics);
        let twice = once.resample(&dynamics);
        assert_eq!(once, twice);
    }
}
