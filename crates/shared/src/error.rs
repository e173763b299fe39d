use serde::{Deserialize, Serialize};

/// Failure body every backend endpoint uses: `{"detail": "..."}`. A missing
/// or empty detail falls back to a caller-supplied generic message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
}

impl ErrorBody {
    pub fn detail_or(self, fallback: &str) -> String {
        match self.detail {
            Some(detail) if !detail.trim().is_empty() => detail,
            _ => fallback.to_string(),
        }
    }
}
