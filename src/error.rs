// Error types for the firewall health checker

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to connect to {host}: {message}")]
    Connection { host: String, message: String },

    #[error("Failed to query {facet}: {message}")]
    Query { facet: &'static str, message: String },

    #[error("Cluster {cluster} must have exactly two members, found {members}")]
    MalformedCluster { cluster: String, members: usize },

    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    #[error("Inventory error: {0}")]
    Inventory(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn connection(host: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Connection {
            host: host.into(),
            message: message.into(),
        }
    }

    pub fn query(facet: &'static str, message: impl Into<String>) -> Self {
        AppError::Query {
            facet,
            message: message.into(),
        }
    }

    /// Operator guidance for this kind of failure
    pub fn remediation(&self) -> String {
        match self {
            AppError::Connection { host, .. } => {
                format!("Could not reach {}. Check that the host is up, SSH is allowed from here and your key is accepted.", host)
            }
            AppError::Query { facet, .. } => {
                format!("The host is reachable but its {} data could not be read. Check the command on the box.", facet)
            }
            AppError::MalformedCluster { .. } => {
                "Fix the cluster definition in the inventory so it lists exactly two members.".to_string()
            }
            AppError::InvalidNetwork(_) => {
                "Use CIDR notation such as 10.0.0.0/8.".to_string()
            }
            AppError::Inventory(_) => {
                "Check the inventory file path and its TOML syntax.".to_string()
            }
            AppError::Timeout(_) => {
                "The host answered too slowly. Raise the timeout or check the link.".to_string()
            }
            AppError::Io(_) => {
                "File system error. Check permissions and that the ssh binary is installed.".to_string()
            }
            AppError::Serialization(_) => {
                "Data format error. This might be a bug, please report it.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AppError::MalformedCluster {
            cluster: "core".to_string(),
            members: 3,
        };
        assert_eq!(err.to_string(), "Cluster core must have exactly two members, found 3");

        let err = AppError::query("routes", "exit status 1");
        assert_eq!(err.to_string(), "Failed to query routes: exit status 1");
    }

    #[test]
    fn test_remediation_distinguishes_unreachable_from_broken_data() {
        let unreachable = AppError::connection("fw-a", "connection refused");
        let broken = AppError::query("routes", "no data returned");

        assert!(unreachable.remediation().contains("Could not reach fw-a"));
        assert!(broken.remediation().contains("routes data"));
    }
}
