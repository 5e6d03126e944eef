//! Signature audit trail: fingerprint capture, event log, wire format.

pub mod collector;
pub mod hash;
pub mod log;
pub mod record;
pub mod user_agent;
pub mod wire;

pub use self::collector::{
    AuditFingerprintCollector, HostEnvironment, PublicIpLookup, SigningEnvironment,
};
pub use self::log::{SignatureEventLog, SignatureEventLogEntry, SignatureEventType, SyncReport};
pub use self::record::{
    BatteryStatus, CanvasSize, DeviceInfo, ExtendedTelemetry, GeoReading, SessionInfo,
    SignatureAuditRecord, SignatureData, Telemetry,
};
pub use self::wire::AuditWireFormat;
