//! Tools module - capabilities exposed to the agents
//!
//! Contains the vehicle-state tool and the tool registry.

pub mod registry;
pub mod vehicle;

pub use registry::ToolRegistry;
pub use vehicle::{get_vehicle_state, Freshness, VehicleReading, VehicleState, VehicleStateTool};
