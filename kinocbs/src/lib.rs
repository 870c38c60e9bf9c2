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

//! Kinodynamic conflict-based search for fleets of rigid-body vehicles in a
//! shared planar workspace.
//!
//! Each agent brings its own start, goal region, dynamics, and rectangular
//! footprint. A solve produces one control-parameterized trajectory per
//! agent such that, executed simultaneously on a shared clock, no two
//! footprints ever overlap at a sampling instant and every agent ends
//! inside its goal region.
//!
//! The search runs on two levels. The high level ([`search::KdCbs`]) does a
//! best-first expansion over a tree of constraint sets, branching on the
//! earliest pairwise conflict of each joint plan. The low level
//! ([`planner::ConstraintRrt`]) grows a control-space random tree for a
//! single agent while honoring the time-windowed spatial constraints that
//! the high level imposes.

pub mod domain;

pub mod error;

pub mod motion;

pub mod planner;

pub mod premade;

pub mod scenario;

pub mod search;

mod util;

pub mod prelude {
    pub use super::domain::*;
    pub use super::motion::*;
    pub use super::planner::*;
    pub use super::premade::*;
    pub use super::scenario::*;
    pub use super::search::*;
}
