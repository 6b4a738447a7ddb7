use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_INTERRUPTION_THRESHOLD, DEFAULT_TASK, DEFAULT_TEMPERATURE, DEFAULT_VOICE};

/// Body of a Bland `send-call` request.  Optional knobs fall back to the
/// service defaults when the caller leaves them out.
#[derive(Debug, Serialize)]
pub struct SendCallRequest {
    pub phone_number: String,
    pub from: String,
    pub task: String,
    pub voice: String,
    pub wait_for_greeting: bool,
    pub temperature: f64,
    pub interruption_threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_audio: Option<String>,
}

impl SendCallRequest {
    pub fn new(
        phone_number: String,
        from: String,
        task: Option<String>,
        voice: Option<String>,
        temperature: Option<f64>,
        interruption_threshold: Option<f64>,
        background_audio: Option<String>,
    ) -> Self {
        Self {
            phone_number,
            from,
            task: task.unwrap_or_else(|| DEFAULT_TASK.to_string()),
            voice: voice.unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            wait_for_greeting: true,
            temperature: temperature.unwrap_or(DEFAULT_TEMPERATURE),
            interruption_threshold: interruption_threshold.unwrap_or(DEFAULT_INTERRUPTION_THRESHOLD),
            background_audio,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SendCallResponse {
    pub call_id: String,
    // Not always present; the call record falls back to a placeholder.
    pub record_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceInfo {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportCallRequest {
    pub reason: String,
}
