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

use crate::domain::Agent;
use crate::motion::{RectangularProfile, Trajectory};
use crate::premade::{car_agent, Bounds, CarControl, CarState, DiscGoal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One vehicle of a scenario file.
#[derive(Serialize, Deserialize, Clone, Debug, Copy)]
pub struct AgentSpec {
    /// Start pose of the vehicle as (x, y, yaw)
    pub start: [f64; 3],
    /// Center of the goal disc
    pub goal: [f64; 2],
    /// Radius of the goal disc (meters)
    #[serde(default = "default_goal_radius")]
    pub goal_radius: f64,
    /// Body width of the vehicle (meters)
    #[serde(default = "default_body_size")]
    pub width: f64,
    /// Body length of the vehicle (meters)
    #[serde(default = "default_body_size")]
    pub length: f64,
}

/// A joint planning problem: named vehicles in a shared rectangular
/// workspace, all propagated at the same time step.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Scenario {
    pub agents: BTreeMap<String, AgentSpec>,
    /// Workspace bounds as [[x_min, x_max], [y_min, y_max]]
    pub bounds: [[f64; 2]; 2],
    /// The propagation step shared by every vehicle (seconds)
    #[serde(default = "default_time_step")]
    pub time_step: f64,
}

impl Scenario {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Instantiate one premade car agent per scenario entry, in the name
    /// order of the map so that agent indices are reproducible.
    pub fn build_fleet(&self) -> Vec<Agent<CarState, CarControl>> {
        let bounds = Bounds::new(
            self.bounds[0][0],
            self.bounds[0][1],
            self.bounds[1][0],
            self.bounds[1][1],
        );
        self.agents
            .iter()
            .map(|(name, spec)| {
                car_agent(
                    name,
                    RectangularProfile::new(spec.width, spec.length),
                    CarState::new(spec.start[0], spec.start[1], spec.start[2]),
                    DiscGoal::new(spec.goal[0], spec.goal[1], spec.goal_radius),
                    bounds,
                    self.time_step,
                )
            })
            .collect()
    }
}

pub fn default_goal_radius() -> f64 {
    0.5
}

pub fn default_body_size() -> f64 {
    1.0
}

pub fn default_time_step() -> f64 {
    0.1
}

/// The caller-owned object that a solve writes its result into: one solved
/// trajectory per agent, keyed by the agent's name.
#[derive(Clone, Debug, Default)]
pub struct ProblemSet<S, C> {
    solutions: BTreeMap<String, Trajectory<S, C>>,
}

impl<S, C> ProblemSet<S, C> {
    pub fn new() -> Self {
        Self {
            solutions: BTreeMap::new(),
        }
    }

    pub fn insert_solution(&mut self, name: String, trajectory: Trajectory<S, C>) {
        self.solutions.insert(name, trajectory);
    }

    pub fn solution(&self, name: &str) -> Option<&Trajectory<S, C>> {
        self.solutions.get(name)
    }

    pub fn solutions(&self) -> &BTreeMap<String, Trajectory<S, C>> {
        &self.solutions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SCENARIO: &str = r#"
agents:
  lead:
    start: [0.0, 0.0, 0.0]
    goal: [10.0, 0.0]
  follower:
    start: [0.0, 5.0, 0.0]
    goal: [10.0, 5.0]
    goal_radius: 0.25
    width: 0.8
    length: 1.2
bounds: [[-2.0, 12.0], [-2.0, 7.0]]
"#;

    #[test]
    fn scenarios_parse_with_defaults() {
        let scenario = Scenario::from_yaml(SCENARIO).unwrap();
        assert_eq!(scenario.agents.len(), 2);
        assert_relative_eq!(scenario.time_step, 0.1);

        let lead = &scenario.agents["lead"];
        assert_relative_eq!(lead.goal_radius, 0.5);
        assert_relative_eq!(lead.width, 1.0);
        assert_relative_eq!(lead.length, 1.0);

        let follower = &scenario.agents["follower"];
        assert_relative_eq!(follower.goal_radius, 0.25);
        assert_relative_eq!(follower.width, 0.8);
    }

    #[test]
    fn scenarios_round_trip_through_yaml() {
        let scenario = Scenario::from_yaml(SCENARIO).unwrap();
        let rewritten = Scenario::from_yaml(&scenario.to_yaml().unwrap()).unwrap();
        assert_eq!(rewritten.agents.len(), scenario.agents.len());
        assert_relative_eq!(
            rewritten.agents["follower"].length,
            scenario.agents["follower"].length,
        );
        assert_relative_eq!(rewritten.time_step, scenario.time_step);
    }

    #[test]
    fn fleets_are_built_in_name_order() {
        let scenario = Scenario::from_yaml(SCENARIO).unwrap();
        let fleet = scenario.build_fleet();
        assert_eq!(fleet.len(), 2);
        // BTreeMap ordering puts "follower" before "lead".
        assert_eq!(fleet[0].name, "follower");
        assert_eq!(fleet[1].name, "lead");
        assert_relative_eq!(fleet[0].profile.width(), 0.8);
        assert_relative_eq!(fleet[1].start.x, 0.0);
        assert_relative_eq!(fleet[1].start.y, 0.0);
    }
}
