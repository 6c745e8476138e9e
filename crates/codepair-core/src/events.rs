// Stream event protocol
//
// Every item the run pipeline emits is a tagged object carrying either a text
// fragment or an error message. On the wire each event is one NDJSON line.

use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::role::Role;

/// Text of the notice that opens an explainer-only stream
pub const EXPLAINER_ONLY_NOTICE: &str = "explainer_only";

/// Stream error text for failures whose details stay in the server log
pub const SYSTEM_ERROR_MESSAGE: &str = "System error. The run could not be completed.";

/// Origin of a stream event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum EventSender {
    Coder,
    Explainer,
    System,
}

impl From<Role> for EventSender {
    fn from(role: Role) -> Self {
        match role {
            Role::Coder => EventSender::Coder,
            Role::Explainer => EventSender::Explainer,
        }
    }
}

/// One event of a run stream: `{sender, text}` or `{sender, error}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct PipelineEvent {
    pub sender: EventSender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineEvent {
    pub fn text(sender: impl Into<EventSender>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: Some(text.into()),
            error: None,
        }
    }

    pub fn error(sender: impl Into<EventSender>, error: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: None,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Serialize as a single newline-terminated JSON line
    pub fn to_ndjson(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        line.push('\n');
        line
    }
}
