//! Error types for the swap pacer

use std::fmt;

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the swap pacer
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid keypair: {0}")]
    InvalidKeypair(String),

    #[error("Invalid proxy spec: {0}")]
    InvalidProxy(String),

    // Transport errors (transient)
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Network error: {0}")]
    Network(String),

    // Provider errors (terminal for that provider)
    #[error("{provider} quote failed: {reason}")]
    ProviderQuote { provider: String, reason: String },

    #[error("{provider} build failed: {reason}")]
    ProviderBuild { provider: String, reason: String },

    #[error("All providers exhausted: {0}")]
    AllProvidersExhausted(FailureLog),

    // Ledger errors
    #[error("Transaction signing failed: {0}")]
    Signing(String),

    #[error("Transaction submission failed: {0}")]
    Submission(String),

    #[error("RPC rejected transaction: {0}")]
    RpcRejected(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_) | Error::Connection(_) | Error::Network(_)
        )
    }
}

/// Which step of a provider call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Quote,
    Build,
    Network,
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Quote => "quote",
            FailureKind::Build => "build",
            FailureKind::Network => "network",
            FailureKind::Other => "other",
        };
        write!(f, "{}", s)
    }
}

impl From<&Error> for FailureKind {
    fn from(e: &Error) -> Self {
        match e {
            Error::ProviderQuote { .. } => FailureKind::Quote,
            Error::ProviderBuild { .. } => FailureKind::Build,
            e if e.is_retryable() => FailureKind::Network,
            _ => FailureKind::Other,
        }
    }
}

/// One provider's failure within a single swap request
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderFailure {
    pub provider: String,
    pub kind: FailureKind,
    /// Calls made to this provider, first try included
    pub attempts: u32,
    pub reason: String,
}

impl ProviderFailure {
    pub fn new(provider: &str, error: &Error, attempts: u32) -> Self {
        Self {
            provider: provider.to_string(),
            kind: FailureKind::from(error),
            attempts,
            reason: error.to_string(),
        }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}, {} attempt(s)]: {}",
            self.provider, self.kind, self.attempts, self.reason
        )
    }
}

/// Ordered list of provider failures
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureLog(pub Vec<ProviderFailure>);

impl FailureLog {
    pub fn providers(&self) -> Vec<&str> {
        self.0.iter().map(|f| f.provider.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for FailureLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "no available providers");
        }
        let parts: Vec<String> = self.0.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", parts.join("; "))
    }
}

// Conversion from reqwest errors, classified by transport failure mode
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else if e.is_connect() {
            Error::Connection(e.to_string())
        } else if e.is_decode() {
            Error::Deserialization(e.to_string())
        } else {
            Error::Network(e.to_string())
        }
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_retryable() {
        assert!(Error::Timeout("t".into()).is_retryable());
        assert!(Error::Connection("reset".into()).is_retryable());
        assert!(Error::Network("tunnel".into()).is_retryable());
    }

    #[test]
    fn test_provider_errors_are_terminal() {
        let quote = Error::ProviderQuote {
            provider: "jupiter".into(),
            reason: "no route".into(),
        };
        assert!(!quote.is_retryable());
        assert!(!Error::Deserialization("bad json".into()).is_retryable());
        assert!(!Error::AllProvidersExhausted(FailureLog::default()).is_retryable());
    }

    #[test]
    fn test_failure_kind_mapping() {
        let build = Error::ProviderBuild {
            provider: "okx".into(),
            reason: "missing tx".into(),
        };
        assert_eq!(FailureKind::from(&build), FailureKind::Build);
        assert_eq!(
            FailureKind::from(&Error::Timeout("x".into())),
            FailureKind::Network
        );
        assert_eq!(
            FailureKind::from(&Error::Internal("x".into())),
            FailureKind::Other
        );
    }

    #[test]
    fn test_failure_log_display() {
        let log = FailureLog(vec![
            ProviderFailure::new("a", &Error::Network("down".into()), 3),
            ProviderFailure::new(
                "b",
                &Error::ProviderQuote {
                    provider: "b".into(),
                    reason: "no route".into(),
                },
                1,
            ),
        ]);
        let text = log.to_string();
        assert!(text.starts_with("a [network, 3 attempt(s)]"));
        assert!(text.contains("b [quote, 1 attempt(s)]"));
        assert_eq!(log.providers(), vec!["a", "b"]);
        assert_eq!(
            FailureLog::default().to_string(),
            "no available providers"
        );
    }
}
