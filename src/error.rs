//! Error types for brokerdesk.

use serde::Serialize;

/// Top-level error type for the signing back office.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Audit store error: {0}")]
    Store(#[from] StoreError),

    #[error("Backend API error: {0}")]
    Api(#[from] ApiError),

    #[error("Lifecycle gate error: {0}")]
    Gate(#[from] GateError),

    #[error("Signing workflow error: {0}")]
    Workflow(#[from] WorkflowError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Local audit log store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Stored audit log is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store backend failure: {0}")]
    Backend(String),

    #[cfg(feature = "libsql")]
    #[error("LibSQL error: {0}")]
    LibSql(#[from] libsql::Error),
}

/// Backend REST API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid backend URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status} for {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Contract already signed: {message}")]
    ContractAlreadySigned { message: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
}

impl ApiError {
    /// Whether this error is an authoritative refusal that must halt the
    /// user action, as opposed to a transport failure.
    pub fn is_authoritative_refusal(&self) -> bool {
        matches!(self, Self::ContractAlreadySigned { .. })
    }
}

/// Errors raised by the contract lifecycle gate.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Modification refused for contract {contract_id}: {reason}")]
    Refused { contract_id: String, reason: String },

    #[error("Could not obtain modification verdict for contract {contract_id}: {source}")]
    VerdictUnavailable {
        contract_id: String,
        #[source]
        source: ApiError,
    },
}

/// Signing workflow errors.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Contract {contract_id} is signed and can no longer be re-signed")]
    ContractSigned { contract_id: String },

    #[error("Local audit log append failed: {0}")]
    Store(#[from] StoreError),

    #[error("Backend rejected the signature: {0}")]
    Api(#[from] ApiError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// Blocks the action until acknowledged.
    Blocking,
}

/// Structured notice shown to the operator when an authoritative refusal
/// halts an action. Replaces blocking browser alerts with a payload that
/// REPL and web surfaces can render the same way.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RefusalNotice {
    pub kind: NoticeKind,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,
}

impl RefusalNotice {
    pub const CONTRACT_ALREADY_SIGNED: &'static str = "CONTRACT_ALREADY_SIGNED";
    pub const MODIFICATION_REFUSED: &'static str = "MODIFICATION_REFUSED";

    /// Build a blocking notice for errors that must halt the action.
    ///
    /// Returns `None` for telemetry and transport failures, which degrade
    /// silently instead of interrupting the signer.
    pub fn from_error(error: &Error) -> Option<Self> {
        match error {
            Error::Api(ApiError::ContractAlreadySigned { message })
            | Error::Workflow(WorkflowError::Api(ApiError::ContractAlreadySigned { message })) => {
                Some(Self {
                    kind: NoticeKind::Blocking,
                    code: Self::CONTRACT_ALREADY_SIGNED,
                    message: message.clone(),
                    contract_id: None,
                })
            }
            Error::Workflow(WorkflowError::ContractSigned { contract_id }) => Some(Self {
                kind: NoticeKind::Blocking,
                code: Self::CONTRACT_ALREADY_SIGNED,
                message: error.to_string(),
                contract_id: Some(contract_id.clone()),
            }),
            Error::Gate(GateError::Refused {
                contract_id,
                reason,
            }) => Some(Self {
                kind: NoticeKind::Blocking,
                code: Self::MODIFICATION_REFUSED,
                message: reason.clone(),
                contract_id: Some(contract_id.clone()),
            }),
            _ => None,
        }
    }

    /// Serialize for transport over string-only status channels.
    pub fn to_status_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"kind\":\"blocking\",\"code\":\"{}\",\"message\":{:?}}}",
                self.code, self.message
            )
        })
    }
}
