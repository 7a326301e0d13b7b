use serde::{Deserialize, Serialize};

/// Error body returned by the analysis service on non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub detail: String,
}

/// Message shown for a failed request: the server's `detail` when the body
/// carries one, otherwise a generic status message.
pub fn error_message_for(status: u16, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => parsed.detail,
        Err(_) => format!("API error: {status}"),
    }
}
