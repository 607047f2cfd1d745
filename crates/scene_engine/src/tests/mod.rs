//! Scenario tests spanning several modules

mod grid_scene;
mod picking_scenarios;
