//! Flattened wire shape for `/api/contracts/signature-audit`.
//!
//! The backend stores one row per event with every nested field lifted to
//! the top level. Datetimes travel as `YYYY-MM-DDTHH:mm:ss` in UTC, with no
//! offset and no fractional seconds.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::log::{SignatureEventLogEntry, SignatureEventType};
use crate::audit::record::{
    CanvasSize, DeviceInfo, SessionInfo, SignatureAuditRecord, SignatureData,
};
use crate::contract::Party;

/// chrono format string for wire datetimes.
pub const WIRE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Format a datetime for the backend.
pub fn format_wire_datetime(dt: &DateTime<Utc>) -> String {
    dt.format(WIRE_DATETIME_FORMAT).to_string()
}

/// Parse a datetime coming back from the backend.
///
/// Tries multiple formats in order:
/// 1. RFC 3339 with timezone (e.g. `2024-01-15T10:30:00.123Z`)
/// 2. Naive `T`-separated with optional fractional seconds, read as UTC
/// 3. Naive space-separated with optional fractional seconds, read as UTC
pub fn parse_wire_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(ndt.and_utc());
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(ndt.and_utc());
    }
    Err(format!("unparseable timestamp: {:?}", s))
}

/// Wire format error for a single audit row.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// One signature event as the backend stores it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuditWireFormat {
    pub contract_id: Option<String>,
    pub signature_type: Party,
    pub event_type: SignatureEventType,
    pub timestamp: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub browser: String,
    #[serde(default)]
    pub browser_version: String,
    #[serde(default)]
    pub screen_resolution: String,
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub page_url: String,
    #[serde(default)]
    pub referrer: String,
    #[serde(default)]
    pub canvas_width: u32,
    #[serde(default)]
    pub canvas_height: u32,
    #[serde(default)]
    pub signature_hash: String,
    #[serde(default)]
    pub signature_length: usize,
    pub log_timestamp: String,
}

impl From<&SignatureEventLogEntry> for AuditWireFormat {
    fn from(entry: &SignatureEventLogEntry) -> Self {
        let record = &entry.record;
        Self {
            contract_id: entry.contract_id.clone(),
            signature_type: entry.signature_type,
            event_type: entry.event_type,
            timestamp: format_wire_datetime(&record.timestamp),
            ip_address: record.ip_address.clone(),
            user_agent: record.user_agent.clone(),
            platform: record.device_info.platform.clone(),
            browser: record.device_info.browser.clone(),
            browser_version: record.device_info.browser_version.clone(),
            screen_resolution: record.device_info.screen_resolution.clone(),
            timezone: record.device_info.timezone.clone(),
            language: record.device_info.language.clone(),
            session_id: record.session_info.session_id.clone(),
            page_url: record.session_info.page_url.clone(),
            referrer: record.session_info.referrer.clone(),
            canvas_width: record.signature_data.canvas_size.width,
            canvas_height: record.signature_data.canvas_size.height,
            signature_hash: record.signature_data.signature_hash.clone(),
            signature_length: record.signature_data.signature_length,
            log_timestamp: format_wire_datetime(&entry.log_timestamp),
        }
    }
}

impl TryFrom<AuditWireFormat> for SignatureEventLogEntry {
    type Error = WireError;

    /// Extended telemetry never goes over the wire, so entries read back
    /// from the backend carry `extended: None`.
    fn try_from(wire: AuditWireFormat) -> Result<Self, Self::Error> {
        let timestamp =
            parse_wire_datetime(&wire.timestamp).map_err(|reason| WireError::InvalidField {
                field: "timestamp",
                reason,
            })?;
        let log_timestamp =
            parse_wire_datetime(&wire.log_timestamp).map_err(|reason| WireError::InvalidField {
                field: "logTimestamp",
                reason,
            })?;

        Ok(Self {
            record: SignatureAuditRecord {
                timestamp,
                ip_address: wire.ip_address,
                user_agent: wire.user_agent,
                device_info: DeviceInfo {
                    platform: wire.platform,
                    browser: wire.browser,
                    browser_version: wire.browser_version,
                    screen_resolution: wire.screen_resolution,
                    timezone: wire.timezone,
                    language: wire.language,
                },
                session_info: SessionInfo {
                    session_id: wire.session_id,
                    page_url: wire.page_url,
                    referrer: wire.referrer,
                },
                signature_data: SignatureData {
                    canvas_size: CanvasSize {
                        width: wire.canvas_width,
                        height: wire.canvas_height,
                    },
                    signature_hash: wire.signature_hash,
                    signature_length: wire.signature_length,
                },
                extended: None,
            },
            contract_id: wire.contract_id,
            signature_type: wire.signature_type,
            event_type: wire.event_type,
            log_timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn entry() -> SignatureEventLogEntry {
        SignatureEventLogEntry {
            record: SignatureAuditRecord {
                timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 14, 5, 9).unwrap()
                    + chrono::Duration::milliseconds(482),
                ip_address: Some("198.51.100.4".to_string()),
                user_agent: "Mozilla/5.0".to_string(),
                device_info: DeviceInfo {
                    platform: "Windows".to_string(),
                    browser: "Chrome".to_string(),
                    browser_version: "120.0.0.0".to_string(),
                    screen_resolution: "1920x1080".to_string(),
                    timezone: "Europe/Lisbon".to_string(),
                    language: "pt-PT".to_string(),
                },
                session_info: SessionInfo {
                    session_id: "s-1".to_string(),
                    page_url: "https://backoffice.example.com/contracts/9".to_string(),
                    referrer: String::new(),
                },
                signature_data: SignatureData::from_image("data:image/png;base64,ABC", 400, 200),
                extended: None,
            },
            contract_id: Some("9".to_string()),
            signature_type: Party::Broker,
            event_type: SignatureEventType::Created,
            log_timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 14, 5, 10).unwrap(),
        }
    }

    #[test]
    fn wire_body_is_flat_and_second_precision() {
        let wire = AuditWireFormat::from(&entry());
        let value = serde_json::to_value(&wire).unwrap();

        assert_eq!(value["contractId"], json!("9"));
        assert_eq!(value["signatureType"], json!("broker"));
        assert_eq!(value["eventType"], json!("created"));
        assert_eq!(value["timestamp"], json!("2025-03-01T14:05:09"));
        assert_eq!(value["logTimestamp"], json!("2025-03-01T14:05:10"));
        assert_eq!(value["canvasWidth"], json!(400));
        assert_eq!(value["canvasHeight"], json!(200));
        assert_eq!(value["signatureLength"], json!(25));
        assert_eq!(value["browserVersion"], json!("120.0.0.0"));
        assert!(value.get("deviceInfo").is_none());
    }

    #[test]
    fn datetime_formatting_is_stable_across_round_trip() {
        let original = entry();
        let wire = AuditWireFormat::from(&original);
        let restored = SignatureEventLogEntry::try_from(wire.clone()).unwrap();
        let rewired = AuditWireFormat::from(&restored);

        assert_eq!(wire, rewired);
        assert_eq!(restored.record.timestamp.timestamp_subsec_millis(), 0);
        assert_eq!(restored.record.signature_data, original.record.signature_data);
        assert_eq!(restored.record.device_info, original.record.device_info);
    }

    #[test]
    fn parse_accepts_backend_variants() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(parse_wire_datetime("2025-01-15T10:30:00").unwrap(), expected);
        assert_eq!(parse_wire_datetime("2025-01-15T10:30:00Z").unwrap(), expected);
        assert_eq!(parse_wire_datetime("2025-01-15 10:30:00").unwrap(), expected);
        assert_eq!(
            parse_wire_datetime("2025-01-15T12:30:00+02:00").unwrap(),
            expected
        );
        assert!(parse_wire_datetime("yesterday").is_err());
    }

    #[test]
    fn bad_timestamp_is_reported_with_field_name() {
        let mut wire = AuditWireFormat::from(&entry());
        wire.log_timestamp = "not-a-date".to_string();
        let err = SignatureEventLogEntry::try_from(wire).unwrap_err();
        assert!(matches!(
            err,
            WireError::InvalidField {
                field: "logTimestamp",
                ..
            }
        ));
    }
}
