//! Controller command types: the value objects that flow in from the (out
//! of scope) NL-parsing layer and the results handed back out (spec §3, §6).

use serde::{Deserialize, Serialize};

use crate::aircraft::{ApproachType, TurnDirection};

/// One instruction within a controller command (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SubCommand {
    Altitude(f64),
    Heading { degrees: f64, turn: Option<TurnDirection> },
    Speed(Option<f64>),
    Approach { approach_type: ApproachType, runway: String },
    Direct(String),
    Hold { fix: String },
    Sid(String),
    Star(String),
    ClimbViaSid,
    DescendViaStar,
    Handoff { facility: Option<String>, frequency: Option<f64> },
    RadarHandoff,
    GoAround,
    ExpectApproach(ApproachType),
    ExpectRunway(String),
    CancelApproach,
    ResumeOwnNavigation,
    RequestFieldSight,
    RequestTrafficSight { traffic_callsign: Option<String> },
}

/// A parsed controller instruction, already resolved to a target callsign
/// (spec §3, §6). `raw_text` is opaque to the core; it is only echoed back
/// in the `CommandResult` and to the radio formatter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerCommand {
    pub callsign: String,
    pub sub_commands: Vec<SubCommand>,
    pub raw_text: String,
}

/// Internal to `PilotAI`: a command record plus an execute-at simulated-time
/// stamp, drained in FIFO order once matured (spec §3, §4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCommand {
    pub sub_commands: Vec<SubCommand>,
    pub execute_at_ms: u64,
    pub raw_text: String,
}

/// Result returned synchronously to the command's originating caller
/// (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub callsign: String,
    pub raw_text: String,
    pub error: Option<String>,
    pub pilot_unable: bool,
}

impl CommandResult {
    pub fn ok(callsign: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self { success: true, callsign: callsign.into(), raw_text: raw_text.into(), error: None, pilot_unable: false }
    }

    pub fn rejected(callsign: impl Into<String>, raw_text: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            callsign: callsign.into(),
            raw_text: raw_text.into(),
            error: Some(error.into()),
            pilot_unable: false,
        }
    }

    pub fn pilot_unable(callsign: impl Into<String>, raw_text: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            callsign: callsign.into(),
            raw_text: raw_text.into(),
            error: Some(error.into()),
            pilot_unable: true,
        }
    }
}
