//! Contract aggregate as served by the back-office REST API.
//!
//! Only the fields the signature-audit subsystem reads are modelled here;
//! everything else in the backend payload is ignored on deserialization.

pub mod gate;
pub mod resolver;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::audit::SignatureAuditRecord;
use crate::audit::wire::parse_wire_datetime;

pub use self::gate::{ContractAction, ContractLifecycleGate};
pub use self::resolver::{
    ContractSignatureState, ContractSignatureStateResolver, PartySignatureState, SignedDate,
    SignedDateSource,
};

/// One of the two contract signatories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    Client,
    Broker,
}

impl Party {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Broker => "broker",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "client" => Some(Self::Client),
            "broker" => Some(Self::Broker),
            _ => None,
        }
    }
}

impl std::fmt::Display for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract status as stored by the backend.
///
/// `status` is mutated independently of the signature fields and can lag
/// behind them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractStatus {
    #[default]
    Draft,
    Active,
    Completed,
    Cancelled,
    Signed,
    SignedPhysical,
    SignedDigital,
    /// A status this client does not know about yet.
    #[serde(other)]
    Unknown,
}

impl ContractStatus {
    /// Statuses that by themselves freeze a contract.
    pub fn is_signing_terminal(self) -> bool {
        matches!(self, Self::SignedPhysical | Self::SignedDigital)
    }
}

/// Contract snapshot relevant to signing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    #[serde(default, deserialize_with = "lenient_status")]
    pub status: ContractStatus,

    /// Base64 data URL of the client's drawn signature.
    #[serde(default)]
    pub client_signature: Option<String>,

    /// Base64 data URL of the broker's drawn signature.
    #[serde(default)]
    pub broker_signature: Option<String>,

    #[serde(default, deserialize_with = "lenient_audit")]
    pub client_signature_audit: Option<SignatureAuditRecord>,

    #[serde(default, deserialize_with = "lenient_audit")]
    pub broker_signature_audit: Option<SignatureAuditRecord>,

    /// Presence implies the contract was signed on paper and scanned.
    #[serde(default)]
    pub scanned_document_url: Option<String>,

    #[serde(default, deserialize_with = "lenient_datetime")]
    pub scanned_document_uploaded_at: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "lenient_datetime")]
    pub signed_date: Option<DateTime<Utc>>,
}

impl Contract {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn signature(&self, party: Party) -> Option<&str> {
        let raw = match party {
            Party::Client => self.client_signature.as_deref(),
            Party::Broker => self.broker_signature.as_deref(),
        };
        raw.filter(|s| !s.is_empty())
    }

    pub fn signature_audit(&self, party: Party) -> Option<&SignatureAuditRecord> {
        match party {
            Party::Client => self.client_signature_audit.as_ref(),
            Party::Broker => self.broker_signature_audit.as_ref(),
        }
    }

    pub fn scanned_document(&self) -> Option<&str> {
        self.scanned_document_url
            .as_deref()
            .filter(|s| !s.is_empty())
    }
}

/// Partial update sent to `PUT /api/contracts/{id}`.
///
/// Audit records travel as JSON strings, matching how the backend stores
/// them.
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContractPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker_signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_signature_audit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker_signature_audit: Option<String>,
}

impl ContractPatch {
    /// Patch setting one party's signature image and its audit record.
    pub fn signature(
        party: Party,
        image: &str,
        audit: &SignatureAuditRecord,
    ) -> Result<Self, serde_json::Error> {
        let audit_json = serde_json::to_string(audit)?;
        let mut patch = Self::default();
        match party {
            Party::Client => {
                patch.client_signature = Some(image.to_string());
                patch.client_signature_audit = Some(audit_json);
            }
            Party::Broker => {
                patch.broker_signature = Some(image.to_string());
                patch.broker_signature_audit = Some(audit_json);
            }
        }
        Ok(patch)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

fn lenient_status<'de, D>(deserializer: D) -> Result<ContractStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<ContractStatus>::deserialize(deserializer)?.unwrap_or_default())
}

/// Audit fields arrive either as an embedded object or as a JSON string.
/// Anything that does not parse becomes `None` instead of failing the
/// whole contract.
fn lenient_audit<'de, D>(deserializer: D) -> Result<Option<SignatureAuditRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(parse_audit_value(value))
}

pub(crate) fn parse_audit_value(value: serde_json::Value) -> Option<SignatureAuditRecord> {
    let parsed = match value {
        serde_json::Value::Null => return None,
        serde_json::Value::String(raw) if raw.trim().is_empty() => return None,
        serde_json::Value::String(raw) => serde_json::from_str(&raw),
        other => serde_json::from_value(other),
    };
    match parsed {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!("Discarding malformed signature audit on contract: {}", e);
            None
        }
    }
}

fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| match parse_wire_datetime(&s) {
        Ok(dt) => Some(dt),
        Err(e) => {
            tracing::debug!("Ignoring unparseable contract datetime: {}", e);
            None
        }
    }))
}
