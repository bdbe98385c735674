//! Tool registry - manages and dispatches tool calls
//!
//! Central hub for registering tools and routing tool calls to handlers.

use std::collections::BTreeMap;

use crate::core::{Config, ToolCall, ToolDefinition, ToolResult};
use crate::tools::vehicle::{self, VehicleStateTool};

/// Registry of available tools
pub struct ToolRegistry {
    /// Tool definitions indexed by name
    definitions: BTreeMap<String, ToolDefinition>,
    vehicle: VehicleStateTool,
}

impl ToolRegistry {
    /// Registry backed by the vehicle-state fixture
    pub fn new() -> Self {
        Self::with_vehicle(VehicleStateTool::fixture())
    }

    /// Registry using the configured telemetry source
    pub fn from_config(config: &Config) -> Self {
        Self::with_vehicle(VehicleStateTool::from_config(&config.tools))
    }

    pub fn with_vehicle(vehicle: VehicleStateTool) -> Self {
        let mut registry = Self {
            definitions: BTreeMap::new(),
            vehicle,
        };
        registry.register(VehicleStateTool::definition());
        registry
    }

    /// Register a tool definition
    fn register(&mut self, definition: ToolDefinition) {
        self.definitions
            .insert(definition.function.name.clone(), definition);
    }

    /// Definitions for the named tools; unknown names are skipped
    pub fn definitions_for(&self, names: &[String]) -> Vec<ToolDefinition> {
        names
            .iter()
            .filter_map(|name| self.definitions.get(name).cloned())
            .collect()
    }

    pub fn vehicle(&self) -> &VehicleStateTool {
        &self.vehicle
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Execute a tool call
    pub async fn execute(&self, tool_call: &ToolCall) -> ToolResult {
        tracing::debug!(tool = %tool_call.name, "executing tool");

        match tool_call.name.as_str() {
            vehicle::TOOL_NAME => self.vehicle.execute().await,
            _ => ToolResult::failure(
                &tool_call.name,
                format!("Unknown tool: {}", tool_call.name),
            ),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_exposes_vehicle_tool() {
        let registry = ToolRegistry::new();
        assert!(registry.contains("get_vehicle_state"));

        let defs = registry.definitions_for(&["get_vehicle_state".into(), "nope".into()]);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].function.parameters["properties"], json!({}));
    }

    #[tokio::test]
    async fn test_execute_vehicle_tool() {
        let registry = ToolRegistry::new();
        let result = registry
            .execute(&ToolCall::new("get_vehicle_state", json!({})))
            .await;

        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["airbags_activated"], json!(true));
        assert_eq!(data["freshness"], json!("fresh"));
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_softly() {
        let result = ToolRegistry::new()
            .execute(&ToolCall::new("open_sunroof", json!({})))
            .await;
        assert!(!result.success);
        assert!(result.output.contains("Unknown tool"));
    }
}
