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

pub mod se2;
pub use se2::{Oriented, Point, Positioned, Vector};

pub mod footprint;
pub use footprint::{Footprint, RectangularProfile};

pub mod trajectory;
pub use trajectory::{Trajectory, TrajectoryError};

pub use time_point::{Duration, TimePoint};

/// A closed span of time. Both endpoints are included, so a window whose
/// start equals its end still covers one sample instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeWindow {
    pub start: TimePoint,
    pub end: TimePoint,
}

impl TimeWindow {
    pub fn new(start: TimePoint, end: TimePoint) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: TimePoint) -> bool {
        self.start <= time && time <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_endpoints_are_inclusive() {
        let t0 = TimePoint::new(0);
        let t1 = TimePoint::new(1_000_000_000);
        let window = TimeWindow::new(t0, t1);
        assert!(window.contains(t0));
        assert!(window.contains(t1));
        assert!(window.contains(t0 + Duration::from_secs_f64(0.5)));
        assert!(!window.contains(t1 + Duration::new(1)));
    }
}
