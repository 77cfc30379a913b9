//! HTTP wire types. Request bodies for grading and chat are the core
//! request structs themselves; this module holds the response envelopes.

use serde::{Deserialize, Serialize};

use crate::domain::Problem;
use crate::session::{SessionFeedback, SessionRecord};

pub use crate::chat::ChatRequest as ChatIn;
pub use crate::feedback::SessionFeedbackRequest as SessionFeedbackIn;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthOut {
    pub ok: bool,
}

/// Body for 202 / 404 answers of the layer endpoints.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusOut {
    pub status: String,
}

impl StatusOut {
    pub fn processing() -> Self {
        Self { status: "processing".into() }
    }

    pub fn not_found() -> Self {
        Self { status: "not_found".into() }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProblemsOut {
    pub problems: Vec<Problem>,
}

/// `?wait=true` on practice generation polls server-side while another
/// request holds the claim.
#[derive(Debug, Default, Deserialize)]
pub struct PracticeQuery {
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFeedbackOut {
    pub session_id: String,
    pub feedback: SessionFeedback,
}

impl From<SessionRecord> for SessionFeedbackOut {
    fn from(record: SessionRecord) -> Self {
        Self { session_id: record.id, feedback: record.feedback }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionsOut {
    pub sessions: Vec<SessionRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatOut {
    pub reply: String,
}
