// Agent roles
//
// A role is an agent identity with its own model, prompt and memory.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::error::PipelineError;

/// Agent role within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Coder,
    Explainer,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Coder, Role::Explainer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Coder => "coder",
            Role::Explainer => "explainer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coder" => Ok(Role::Coder),
            "explainer" => Ok(Role::Explainer),
            other => Err(PipelineError::validation(format!(
                "Unknown role '{}'. Use 'coder' or 'explainer'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("coder".parse::<Role>().unwrap(), Role::Coder);
        assert_eq!("explainer".parse::<Role>().unwrap(), Role::Explainer);
        assert!("Coder".parse::<Role>().is_err());
        assert!("reviewer".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde() {
        assert_eq!(serde_json::to_string(&Role::Coder).unwrap(), r#""coder""#);
        let role: Role = serde_json::from_str(r#""explainer""#).unwrap();
        assert_eq!(role, Role::Explainer);
    }
}
