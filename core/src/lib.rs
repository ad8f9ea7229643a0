//! agentworks-core: deterministic tile-based city and logistics simulation.

pub mod blueprint;
pub mod command;
pub mod components;
pub mod config;
pub mod courier_system;
pub mod economy;
pub mod ecs;
pub mod engine;
pub mod error;
pub mod event;
pub mod expansion_system;
pub mod food_system;
pub mod maintenance_system;
pub mod map_gen;
pub mod movement_system;
pub mod needs_system;
pub mod pathfinder;
pub mod policy_system;
pub mod rng;
pub mod save;
pub mod snapshot;
pub mod store;
pub mod system;
pub mod transit_system;
pub mod types;
pub mod world;
