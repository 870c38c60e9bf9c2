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

pub type Point = nalgebra::geometry::Point2<f64>;
pub type Vector = nalgebra::Vector2<f64>;

/// Implement this trait for states that can express a planar position.
pub trait Positioned {
    fn point(&self) -> Point;
}

/// Implement this trait for states that can express an SE(2) heading.
pub trait Oriented {
    /// The heading in radians, normalized to (-pi, pi].
    fn yaw(&self) -> f64;
}

impl Positioned for Point {
    fn point(&self) -> Point {
        *self
    }
}

/// Normalize an angle into (-pi, pi].
pub fn wrap_angle(angle: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    let mut wrapped = angle % TAU;
    if wrapped <= -PI {
        wrapped += TAU;
    } else if wrapped > PI {
        wrapped -= TAU;
    }
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn angles_wrap_into_half_open_interval() {
        assert_relative_eq!(wrap_angle(0.0), 0.0);
        assert_relative_eq!(wrap_angle(3.0 * PI), PI);
        assert_relative_eq!(wrap_angle(-3.0 * PI), PI);
        assert_relative_eq!(wrap_angle(PI), PI);
        assert_relative_eq!(wrap_angle(-PI), PI);
        assert_relative_eq!(wrap_angle(PI / 2.0 + 4.0 * PI), PI / 2.0);
    }
}
