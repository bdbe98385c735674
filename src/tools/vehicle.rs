//! Vehicle state tool
//!
//! The situation agent's only data source. Readings go through a
//! [`TelemetrySource`] with a timeout; when the source does not answer, the
//! last good reading is returned marked stale, or the reading is unavailable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::Command;

use crate::core::config::ToolsConfig;
use crate::core::{EvanaError, Result, ToolDefinition, ToolResult};

/// Name under which the tool is exposed to the model
pub const TOOL_NAME: &str = "get_vehicle_state";

/// On/off status of a vehicle system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Power {
    On,
    Off,
}

/// Open/closed status of doors and windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Opening {
    Open,
    Closed,
}

impl std::fmt::Display for Power {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Power::On => "on",
            Power::Off => "off",
        })
    }
}

impl std::fmt::Display for Opening {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Opening::Open => "open",
            Opening::Closed => "closed",
        })
    }
}

/// Snapshot of the vehicle after an incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VehicleState {
    pub airbags_activated: bool,
    pub motor_engine_status: Power,
    pub door_status: Opening,
    pub windows_status: Opening,
    pub hazard_lights_status: Power,
}

impl VehicleState {
    /// Static reading used until live telemetry is wired in
    pub const fn fixture() -> Self {
        Self {
            airbags_activated: true,
            motor_engine_status: Power::Off,
            door_status: Opening::Closed,
            windows_status: Opening::Closed,
            hazard_lights_status: Power::Off,
        }
    }

    /// One neutral sentence summarising the state
    pub fn describe(&self) -> String {
        let airbags = if self.airbags_activated {
            "The airbags have deployed"
        } else {
            "The airbags have not deployed"
        };
        format!(
            "{}, the engine is {}, the doors are {}, the windows are {}, and the hazard lights are {}.",
            airbags,
            self.motor_engine_status,
            self.door_status,
            self.windows_status,
            self.hazard_lights_status
        )
    }
}

/// Zero-argument read of the vehicle state fixture
pub fn get_vehicle_state() -> VehicleState {
    VehicleState::fixture()
}

/// Where vehicle readings come from
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn read(&self) -> Result<VehicleState>;

    fn name(&self) -> &str;
}

/// Always returns [`VehicleState::fixture`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureTelemetry;

#[async_trait]
impl TelemetrySource for FixtureTelemetry {
    async fn read(&self) -> Result<VehicleState> {
        Ok(get_vehicle_state())
    }

    fn name(&self) -> &str {
        "fixture"
    }
}

/// Runs an external command that prints the vehicle state as JSON
#[derive(Debug, Clone)]
pub struct CommandTelemetry {
    program: String,
    args: Vec<String>,
}

impl CommandTelemetry {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a `[program, args...]` list
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }
}

#[async_trait]
impl TelemetrySource for CommandTelemetry {
    async fn read(&self) -> Result<VehicleState> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| EvanaError::tool(format!("Failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EvanaError::tool(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }

    fn name(&self) -> &str {
        &self.program
    }
}

/// How current a reading is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    Fresh,
    Stale,
    Unavailable,
}

/// Result of reading through [`VehicleStateTool`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleReading {
    pub state: Option<VehicleState>,
    pub freshness: Freshness,
}

impl VehicleReading {
    /// JSON handed back to the model
    pub fn to_json(&self) -> Value {
        let mut value = match self.state {
            Some(ref state) => serde_json::to_value(state).unwrap_or_else(|_| json!({})),
            None => json!({}),
        };
        value["freshness"] = json!(self.freshness);
        value
    }
}

/// The `get_vehicle_state` tool
pub struct VehicleStateTool {
    source: Arc<dyn TelemetrySource>,
    timeout: Duration,
    last_good: Mutex<Option<VehicleState>>,
}

impl VehicleStateTool {
    pub fn new(source: Arc<dyn TelemetrySource>, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            last_good: Mutex::new(None),
        }
    }

    /// Tool backed by the static fixture
    pub fn fixture() -> Self {
        Self::new(Arc::new(FixtureTelemetry), Duration::from_millis(2000))
    }

    pub fn from_config(config: &ToolsConfig) -> Self {
        let timeout = Duration::from_millis(config.telemetry_timeout_ms);
        match config
            .telemetry_command
            .as_deref()
            .and_then(CommandTelemetry::from_argv)
        {
            Some(command) => Self::new(Arc::new(command), timeout),
            None => Self::new(Arc::new(FixtureTelemetry), timeout),
        }
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::function(
            TOOL_NAME,
            "Get the current vehicle state as a JSON object.",
            json!({
                "type": "object",
                "properties": {}
            }),
        )
    }

    /// Read the vehicle state, degrading to stale or unavailable
    pub async fn read(&self) -> VehicleReading {
        let outcome = tokio::time::timeout(self.timeout, self.source.read()).await;

        let error = match outcome {
            Ok(Ok(state)) => {
                if let Ok(mut last) = self.last_good.lock() {
                    *last = Some(state);
                }
                return VehicleReading {
                    state: Some(state),
                    freshness: Freshness::Fresh,
                };
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {:?}", self.timeout),
        };

        tracing::warn!(source = self.source.name(), %error, "vehicle telemetry read failed");

        match self.last_good.lock().ok().and_then(|last| *last) {
            Some(state) => VehicleReading {
                state: Some(state),
                freshness: Freshness::Stale,
            },
            None => VehicleReading {
                state: None,
                freshness: Freshness::Unavailable,
            },
        }
    }

    /// Execute as a model tool call
    pub async fn execute(&self) -> ToolResult {
        let reading = self.read().await;
        let data = reading.to_json();
        ToolResult {
            tool_name: TOOL_NAME.to_string(),
            success: reading.freshness != Freshness::Unavailable,
            output: data.to_string(),
            data: Some(data),
        }
    }
}

impl Default for VehicleStateTool {
    fn default() -> Self {
        Self::fixture()
    }
}
