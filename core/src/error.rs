use crate::types::CustomerId;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Precondition violated for customer {customer_id}: {detail}")]
    PreconditionViolation {
        customer_id: CustomerId,
        detail: String,
    },

    #[error("Cannot build {name} distribution: {detail}")]
    Distribution { name: &'static str, detail: String },

    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse {path}: {source}")]
    Serialization {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type SimResult<T> = Result<T, SimError>;

/// One invalid configuration field.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigIssue {
    pub field: String,
    pub reason: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Every invalid field found while validating a scheme, reported together.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid scheme configuration ({} issue(s)): {}", .issues.len(), join_issues(.issues))]
pub struct ConfigError {
    pub issues: Vec<ConfigIssue>,
}

impl ConfigError {
    pub fn has_field(&self, field: &str) -> bool {
        self.issues.iter().any(|i| i.field == field)
    }
}

fn join_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(ConfigIssue::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
