//! HTTP API handlers for roster-lists

pub mod agents;
pub mod health;
pub mod lists;

pub use agents::{agent_routes, create_agent, delete_agent, list_agents};
pub use health::health_routes;
pub use lists::{get_lists, list_routes, upload_list};
