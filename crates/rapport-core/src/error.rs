/// Errors surfaced by the Rapport trust layer.
///
/// The variants split into two groups: failures that need the user to act
/// (re-enter a phrase, re-scan a code) and failures that clear up on their own
/// once connectivity returns.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrustError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("cryptographic failure: {0}")]
    CryptographicFailure(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl TrustError {
    /// Whether the failure needs corrective action from the user.
    pub fn requires_user_action(&self) -> bool {
        matches!(self, Self::MalformedInput(_) | Self::CryptographicFailure(_))
    }

    /// Whether the failure is expected to resolve on reconnect.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransportFailure(_))
    }
}

impl From<serde_json::Error> for TrustError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
