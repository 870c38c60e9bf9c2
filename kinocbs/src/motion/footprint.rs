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

use crate::motion::se2::{Oriented, Point, Positioned, Vector};

/// The rectangular body of a vehicle, described in its own frame. The
/// reference point is the geometric center, `width` spans the local
/// x-axis and `length` the local y-axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RectangularProfile {
    width: f64,
    length: f64,
}

impl RectangularProfile {
    pub fn new(width: f64, length: f64) -> Self {
        Self { width, length }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn length(&self) -> f64 {
        self.length
    }
}

/// The oriented rectangle occupied by a vehicle at one configuration.
///
/// Corners are stored in counter-clockwise ring order starting from the
/// body-frame (-width/2, -length/2) corner.
#[derive(Clone, Debug, PartialEq)]
pub struct Footprint {
    corners: [Point; 4],
}

impl Footprint {
    pub fn from_pose(center: Point, yaw: f64, profile: &RectangularProfile) -> Self {
        let (sin, cos) = yaw.sin_cos();
        let half_w = profile.width() / 2.0;
        let half_l = profile.length() / 2.0;
        let along = Vector::new(half_w * cos, half_w * sin);
        let across = Vector::new(-half_l * sin, half_l * cos);
        Self {
            corners: [
                center - along - across,
                center + along - across,
                center + along + across,
                center - along + across,
            ],
        }
    }

    pub fn of<S: Positioned + Oriented>(state: &S, profile: &RectangularProfile) -> Self {
        Self::from_pose(state.point(), state.yaw(), profile)
    }

    pub fn corners(&self) -> &[Point; 4] {
        &self.corners
    }

    /// Whether the closed regions of the two footprints intersect. Touching
    /// edges or corners count as an intersection, so this is exactly the
    /// negation of topological disjointness.
    ///
    /// The test is symmetric and deterministic: the same pair of footprints
    /// always produces the same answer regardless of argument order.
    pub fn intersects(&self, other: &Footprint) -> bool {
        !separated(&self.corners, &other.corners) && !separated(&other.corners, &self.corners)
    }
}

fn project(corners: &[Point; 4], axis: &Vector) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for corner in corners {
        let d = corner.coords.dot(axis);
        min = min.min(d);
        max = max.max(d);
    }
    (min, max)
}

/// Separating-axis check over the edge normals of `a`. Intervals that merely
/// touch do not separate.
fn separated(a: &[Point; 4], b: &[Point; 4]) -> bool {
    for i in 0..4 {
        let edge = a[(i + 1) % 4] - a[i];
        let axis = Vector::new(-edge.y, edge.x);
        let (min_a, max_a) = project(a, &axis);
        let (min_b, max_b) = project(b, &axis);
        if max_a < min_b || max_b < min_a {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn unit_square_at(x: f64, y: f64, yaw: f64) -> Footprint {
        Footprint::from_pose(Point::new(x, y), yaw, &RectangularProfile::new(1.0, 1.0))
    }

    #[test]
    fn corners_of_axis_aligned_rectangle() {
        let footprint = Footprint::from_pose(
            Point::new(2.0, 3.0),
            0.0,
            &RectangularProfile::new(4.0, 2.0),
        );
        let corners = footprint.corners();
        assert_relative_eq!(corners[0].x, 0.0);
        assert_relative_eq!(corners[0].y, 2.0);
        assert_relative_eq!(corners[1].x, 4.0);
        assert_relative_eq!(corners[1].y, 2.0);
        assert_relative_eq!(corners[2].x, 4.0);
        assert_relative_eq!(corners[2].y, 4.0);
        assert_relative_eq!(corners[3].x, 0.0);
        assert_relative_eq!(corners[3].y, 4.0);
    }

    #[test]
    fn construction_is_rotation_equivariant() {
        let profile = RectangularProfile::new(1.5, 0.7);
        let (x, y, yaw) = (2.0, -1.0, 0.4);
        for phi in [0.3, PI / 2.0, -1.2] {
            let (sin, cos) = phi.sin_cos();
            let rotated_center = Point::new(x * cos - y * sin, x * sin + y * cos);
            let direct = Footprint::from_pose(rotated_center, yaw + phi, &profile);
            let original = Footprint::from_pose(Point::new(x, y), yaw, &profile);
            for (a, b) in direct.corners().iter().zip(original.corners()) {
                assert_relative_eq!(a.x, b.x * cos - b.y * sin, epsilon = 1e-12);
                assert_relative_eq!(a.y, b.x * sin + b.y * cos, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn overlapping_rectangles_intersect() {
        assert!(unit_square_at(0.0, 0.0, 0.0).intersects(&unit_square_at(0.5, 0.5, 0.0)));
        assert!(unit_square_at(0.0, 0.0, 0.0).intersects(&unit_square_at(0.9, 0.0, PI / 4.0)));
    }

    #[test]
    fn distant_rectangles_do_not_intersect() {
        assert!(!unit_square_at(0.0, 0.0, 0.0).intersects(&unit_square_at(2.5, 0.0, 0.0)));
        assert!(!unit_square_at(0.0, 0.0, 0.3).intersects(&unit_square_at(0.0, 3.0, -0.3)));
    }

    #[test]
    fn touching_edges_count_as_intersection() {
        assert!(unit_square_at(0.0, 0.0, 0.0).intersects(&unit_square_at(1.0, 0.0, 0.0)));
    }

    #[test]
    fn touching_corners_count_as_intersection() {
        assert!(unit_square_at(0.0, 0.0, 0.0).intersects(&unit_square_at(1.0, 1.0, 0.0)));
    }

    #[test]
    fn intersection_test_is_symmetric() {
        let a = unit_square_at(0.0, 0.0, 0.2);
        let b = unit_square_at(1.1, 0.3, -0.7);
        assert_eq!(a.intersects(&b), b.intersects(&a));
        let c = unit_square_at(4.0, 0.0, 1.1);
        assert_eq!(a.intersects(&c), c.intersects(&a));
    }

    #[test]
    fn rotated_diagonal_neighbors_separate() {
        // Rotating both squares by 45 degrees pulls their corners apart even
        // though their axis-aligned versions would touch at (0.5, 0.5).
        let a = unit_square_at(0.0, 0.0, PI / 4.0);
        let b = unit_square_at(1.2, 1.2, PI / 4.0);
        assert!(!a.intersects(&b));
    }
}
