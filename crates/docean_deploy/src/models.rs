//! Provider-side records: connection details, list rows and phases.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Connection details the provider issues for a managed database or cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub host: String,
    #[serde(deserialize_with = "port_from_number_or_string")]
    pub port: u16,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl: Option<bool>,
}

impl ConnectionInfo {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            user: user.into(),
            password: password.into(),
            uri: None,
            ssl: None,
        }
    }

    /// `host:port`, the form Redis clients are configured with.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn port_from_number_or_string<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(n) => Ok(n),
        Port::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// One row of a provider list command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub id: String,
    pub name: String,
}

impl ResourceSummary {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Status string reported for a managed database cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseStatus(pub String);

impl DatabaseStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into().trim().to_string())
    }

    pub fn is_online(&self) -> bool {
        self.0.eq_ignore_ascii_case("online")
    }
}

impl fmt::Display for DatabaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "unknown")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Phase of an App Platform deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentPhase {
    PendingBuild,
    Building,
    PendingDeploy,
    Deploying,
    Active,
    Superseded,
    Error,
    Canceled,
    Unknown(String),
}

impl DeploymentPhase {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING_BUILD" => Self::PendingBuild,
            "BUILDING" => Self::Building,
            "PENDING_DEPLOY" => Self::PendingDeploy,
            "DEPLOYING" => Self::Deploying,
            "ACTIVE" => Self::Active,
            "SUPERSEDED" => Self::Superseded,
            "ERROR" => Self::Error,
            "CANCELED" | "CANCELLED" => Self::Canceled,
            _ => Self::Unknown(s.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::PendingBuild => "PENDING_BUILD",
            Self::Building => "BUILDING",
            Self::PendingDeploy => "PENDING_DEPLOY",
            Self::Deploying => "DEPLOYING",
            Self::Active => "ACTIVE",
            Self::Superseded => "SUPERSEDED",
            Self::Error => "ERROR",
            Self::Canceled => "CANCELED",
            Self::Unknown(s) if s.is_empty() => "UNKNOWN",
            Self::Unknown(s) => s.as_str(),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Terminal phases that mean the deployment will not become active.
    /// A superseded deployment was replaced by a newer one and never goes live.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Error | Self::Canceled | Self::Superseded)
    }
}

impl fmt::Display for DeploymentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
