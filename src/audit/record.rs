//! Signature audit record captured at the moment a signature is drawn or
//! cleared.

use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::hash::{signature_hash, utf16_len};

/// Forensic snapshot of one signature action. Immutable once built; every
/// later action produces a new record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignatureAuditRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub device_info: DeviceInfo,
    pub session_info: SessionInfo,
    pub signature_data: SignatureData,
    /// Informational only; never consulted by signing decisions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended: Option<ExtendedTelemetry>,
}

impl SignatureAuditRecord {
    /// Whether this record describes a cleared signature.
    pub fn is_cleared(&self) -> bool {
        self.signature_data.is_cleared()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub platform: String,
    pub browser: String,
    pub browser_version: String,
    pub screen_resolution: String,
    pub timezone: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub page_url: String,
    pub referrer: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignatureData {
    pub canvas_size: CanvasSize,
    pub signature_hash: String,
    pub signature_length: usize,
}

impl SignatureData {
    /// Derive hash and length from the raw data URL. An empty image yields
    /// the cleared sentinel: length 0 and the hash of the empty string.
    pub fn from_image(signature_image: &str, width: u32, height: u32) -> Self {
        Self {
            canvas_size: CanvasSize { width, height },
            signature_hash: signature_hash(signature_image),
            signature_length: utf16_len(signature_image),
        }
    }

    pub fn is_cleared(&self) -> bool {
        self.signature_length == 0
    }
}

/// Result of a best-effort reading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Telemetry<T> {
    Available(T),
    Unavailable,
}

impl<T> Telemetry<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

impl<T> From<Option<T>> for Telemetry<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Available(v),
            None => Self::Unavailable,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HardwareInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_concurrency: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_memory_gb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_touch_points: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub cookies_enabled: bool,
    pub online: bool,
    pub touch_support: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatteryStatus {
    pub level: f64,
    pub charging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeoReading {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Fingerprints {
    /// Rolling hash over the stable environment signals.
    pub environment_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_mime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_bytes: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedTelemetry {
    pub hardware: HardwareInfo,
    pub capabilities: Capabilities,
    pub battery: Telemetry<BatteryStatus>,
    pub geolocation: Telemetry<GeoReading>,
    pub fingerprints: Fingerprints,
}

/// MIME type and decoded byte size of a `data:<mime>;base64,<payload>` URL.
///
/// Returns `None` for anything that is not a well-formed base64 data URL.
pub fn inspect_data_url(data_url: &str) -> Option<(String, usize)> {
    let rest = data_url.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .ok()?;
    Some((mime.to_string(), bytes.len()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn signature_data_for_known_image() {
        let data = SignatureData::from_image("data:image/png;base64,ABC", 400, 200);
        assert_eq!(
            data.canvas_size,
            CanvasSize {
                width: 400,
                height: 200
            }
        );
        assert_eq!(data.signature_length, 25);
        assert_eq!(
            data.signature_hash,
            SignatureData::from_image("data:image/png;base64,ABC", 1, 1).signature_hash
        );
        assert!(!data.is_cleared());
    }

    #[test]
    fn empty_image_is_cleared_sentinel() {
        let data = SignatureData::from_image("", 300, 150);
        assert!(data.is_cleared());
        assert_eq!(data.signature_hash, "0");
    }

    #[test]
    fn signature_data_serializes_camel_case() {
        let data = SignatureData::from_image("", 10, 20);
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(
            value,
            json!({
                "canvasSize": {"width": 10, "height": 20},
                "signatureHash": "0",
                "signatureLength": 0
            })
        );
    }

    #[test]
    fn telemetry_unavailable_serializes_as_sentinel() {
        let battery: Telemetry<BatteryStatus> = None.into();
        assert_eq!(
            serde_json::to_value(&battery).unwrap(),
            json!({"status": "unavailable"})
        );
    }

    #[test]
    fn data_url_inspection() {
        assert_eq!(
            inspect_data_url("data:image/png;base64,aGVsbG8="),
            Some(("image/png".to_string(), 5))
        );
        assert_eq!(inspect_data_url("data:image/png,raw"), None);
        assert_eq!(inspect_data_url("not a data url"), None);
        assert_eq!(inspect_data_url(""), None);
    }
}
