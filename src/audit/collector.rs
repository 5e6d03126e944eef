//! Builds [`SignatureAuditRecord`]s from a signature image and whatever the
//! signing environment can tell us about itself.
//!
//! Every reading is best-effort. A failed IP lookup omits the address, a
//! missing battery or geolocation API becomes `Telemetry::Unavailable`,
//! and `create_audit_data` always returns a record.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::audit::hash::signature_hash;
use crate::audit::record::{
    BatteryStatus, Capabilities, DeviceInfo, ExtendedTelemetry, Fingerprints, GeoReading,
    HardwareInfo, SessionInfo, SignatureAuditRecord, SignatureData, inspect_data_url,
};
use crate::audit::user_agent;

/// Upper bound on the geolocation reading when none is configured.
pub const DEFAULT_GEOLOCATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Signals exposed by the surface a signature was drawn on.
#[async_trait]
pub trait SigningEnvironment: Send + Sync {
    fn user_agent(&self) -> String;
    fn screen_resolution(&self) -> String;
    fn timezone(&self) -> String;
    fn language(&self) -> String;
    fn page_url(&self) -> String;
    fn referrer(&self) -> String;

    fn hardware(&self) -> HardwareInfo {
        HardwareInfo::default()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// `None` when the platform has no battery API.
    async fn battery(&self) -> Option<BatteryStatus> {
        None
    }

    /// `None` when location is unavailable or denied.
    async fn geolocation(&self) -> Option<GeoReading> {
        None
    }
}

/// Best-effort public IP lookup.
#[async_trait]
pub trait PublicIpLookup: Send + Sync {
    /// Returns `None` on any failure; never errors.
    async fn lookup(&self) -> Option<String>;
}

/// Environment of the local process, used when signatures are captured
/// through the CLI rather than a browser canvas.
#[derive(Debug, Clone)]
pub struct HostEnvironment {
    pub user_agent: String,
    pub screen_resolution: String,
    pub timezone: String,
    pub language: String,
    pub page_url: String,
    pub referrer: String,
}

impl HostEnvironment {
    pub fn detect(page_url: impl Into<String>) -> Self {
        let timezone = std::env::var("TZ")
            .ok()
            .filter(|tz| !tz.trim().is_empty())
            .unwrap_or_else(|| chrono::Local::now().offset().to_string());

        let language = std::env::var("LC_ALL")
            .or_else(|_| std::env::var("LANG"))
            .ok()
            .and_then(|raw| normalize_locale(&raw))
            .unwrap_or_else(|| "en-US".to_string());

        Self {
            user_agent: format!(
                "brokerdesk/{} ({}; {})",
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS,
                std::env::consts::ARCH
            ),
            screen_resolution: user_agent::UNKNOWN.to_string(),
            timezone,
            language,
            page_url: page_url.into(),
            referrer: String::new(),
        }
    }
}

/// `pt_BR.UTF-8` -> `pt-BR`. `C` and `POSIX` carry no language.
fn normalize_locale(raw: &str) -> Option<String> {
    let base = raw.split(['.', '@']).next()?.trim();
    if base.is_empty() || base == "C" || base == "POSIX" {
        return None;
    }
    Some(base.replace('_', "-"))
}

#[async_trait]
impl SigningEnvironment for HostEnvironment {
    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }

    fn screen_resolution(&self) -> String {
        self.screen_resolution.clone()
    }

    fn timezone(&self) -> String {
        self.timezone.clone()
    }

    fn language(&self) -> String {
        self.language.clone()
    }

    fn page_url(&self) -> String {
        self.page_url.clone()
    }

    fn referrer(&self) -> String {
        self.referrer.clone()
    }

    fn hardware(&self) -> HardwareInfo {
        HardwareInfo {
            hardware_concurrency: std::thread::available_parallelism()
                .ok()
                .and_then(|n| u32::try_from(n.get()).ok()),
            device_memory_gb: None,
            max_touch_points: Some(0),
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            cookies_enabled: false,
            online: true,
            touch_support: false,
        }
    }
}

/// Produces audit records for one signing session.
pub struct AuditFingerprintCollector {
    environment: Arc<dyn SigningEnvironment>,
    ip_lookup: Option<Arc<dyn PublicIpLookup>>,
    session_id: String,
    geolocation_timeout: Duration,
}

impl AuditFingerprintCollector {
    pub fn new(environment: Arc<dyn SigningEnvironment>) -> Self {
        Self {
            environment,
            ip_lookup: None,
            session_id: Uuid::new_v4().to_string(),
            geolocation_timeout: DEFAULT_GEOLOCATION_TIMEOUT,
        }
    }

    pub fn with_ip_lookup(mut self, lookup: Arc<dyn PublicIpLookup>) -> Self {
        self.ip_lookup = Some(lookup);
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_geolocation_timeout(mut self, timeout: Duration) -> Self {
        self.geolocation_timeout = timeout;
        self
    }

    /// Build the audit record for a signature image, or for a cleared
    /// signature when `signature_image` is empty.
    pub async fn create_audit_data(
        &self,
        signature_image: &str,
        width: u32,
        height: u32,
    ) -> SignatureAuditRecord {
        let timestamp = Utc::now();
        let env = &self.environment;

        let (ip_address, battery, geolocation) = tokio::join!(
            self.lookup_ip(),
            env.battery(),
            self.read_geolocation()
        );

        let user_agent = env.user_agent();
        let ua = user_agent::classify(&user_agent);
        let device_info = DeviceInfo {
            platform: ua.platform.as_str().to_string(),
            browser: ua.browser.as_str().to_string(),
            browser_version: ua.browser_version,
            screen_resolution: env.screen_resolution(),
            timezone: env.timezone(),
            language: env.language(),
        };

        let (image_mime, image_bytes) = match inspect_data_url(signature_image) {
            Some((mime, bytes)) => (Some(mime), Some(bytes)),
            None => (None, None),
        };
        let fingerprints = Fingerprints {
            environment_hash: environment_hash(&user_agent, &device_info),
            image_mime,
            image_bytes,
        };

        if battery.is_none() {
            tracing::debug!("Battery status unavailable for signature audit");
        }

        SignatureAuditRecord {
            timestamp,
            ip_address,
            user_agent,
            session_info: SessionInfo {
                session_id: self.session_id.clone(),
                page_url: env.page_url(),
                referrer: env.referrer(),
            },
            device_info,
            signature_data: SignatureData::from_image(signature_image, width, height),
            extended: Some(ExtendedTelemetry {
                hardware: env.hardware(),
                capabilities: env.capabilities(),
                battery: battery.into(),
                geolocation: geolocation.into(),
                fingerprints,
            }),
        }
    }

    async fn lookup_ip(&self) -> Option<String> {
        let lookup = self.ip_lookup.as_ref()?;
        let ip = lookup.lookup().await;
        if ip.is_none() {
            tracing::debug!("Public IP lookup failed; omitting ipAddress from audit record");
        }
        ip
    }

    async fn read_geolocation(&self) -> Option<GeoReading> {
        match tokio::time::timeout(self.geolocation_timeout, self.environment.geolocation()).await
        {
            Ok(reading) => reading,
            Err(_) => {
                tracing::debug!(
                    "Geolocation reading exceeded {:?}; marking unavailable",
                    self.geolocation_timeout
                );
                None
            }
        }
    }
}

fn environment_hash(user_agent: &str, device: &DeviceInfo) -> String {
    signature_hash(&format!(
        "{}|{}|{}|{}|{}",
        user_agent, device.platform, device.screen_resolution, device.timezone, device.language
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::record::Telemetry;

    const CHROME_MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

    struct FakeBrowser {
        geolocation_delay: Option<Duration>,
    }

    #[async_trait]
    impl SigningEnvironment for FakeBrowser {
        fn user_agent(&self) -> String {
            CHROME_MAC.to_string()
        }
        fn screen_resolution(&self) -> String {
            "1920x1080".to_string()
        }
        fn timezone(&self) -> String {
            "America/Sao_Paulo".to_string()
        }
        fn language(&self) -> String {
            "pt-BR".to_string()
        }
        fn page_url(&self) -> String {
            "https://backoffice.example.com/contracts/7/sign".to_string()
        }
        fn referrer(&self) -> String {
            "https://backoffice.example.com/contracts/7".to_string()
        }
        async fn battery(&self) -> Option<BatteryStatus> {
            Some(BatteryStatus {
                level: 0.8,
                charging: false,
            })
        }
        async fn geolocation(&self) -> Option<GeoReading> {
            if let Some(delay) = self.geolocation_delay {
                tokio::time::sleep(delay).await;
            }
            Some(GeoReading {
                latitude: -23.55,
                longitude: -46.63,
                accuracy_m: 30.0,
            })
        }
    }

    struct FixedIp(Option<&'static str>);

    #[async_trait]
    impl PublicIpLookup for FixedIp {
        async fn lookup(&self) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    fn collector(delay: Option<Duration>) -> AuditFingerprintCollector {
        AuditFingerprintCollector::new(Arc::new(FakeBrowser {
            geolocation_delay: delay,
        }))
        .with_session_id("session-1")
    }

    #[tokio::test]
    async fn record_carries_device_and_session_info() {
        let record = collector(None)
            .with_ip_lookup(Arc::new(FixedIp(Some("203.0.113.9"))))
            .create_audit_data("data:image/png;base64,ABC", 400, 200)
            .await;

        assert_eq!(record.ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(record.device_info.browser, "Chrome");
        assert_eq!(record.device_info.browser_version, "121.0.0.0");
        assert_eq!(record.device_info.platform, "macOS");
        assert_eq!(record.device_info.screen_resolution, "1920x1080");
        assert_eq!(record.session_info.session_id, "session-1");
        assert_eq!(record.signature_data.signature_length, 25);
        assert_eq!(record.signature_data.canvas_size.width, 400);
        assert_eq!(record.signature_data.canvas_size.height, 200);

        let extended = record.extended.expect("extended telemetry");
        assert!(extended.battery.is_available());
        assert!(extended.geolocation.is_available());
    }

    #[tokio::test]
    async fn failed_ip_lookup_omits_the_field() {
        let record = collector(None)
            .with_ip_lookup(Arc::new(FixedIp(None)))
            .create_audit_data("data:image/png;base64,ABC", 400, 200)
            .await;
        assert!(record.ip_address.is_none());

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("ipAddress").is_none());
    }

    #[tokio::test]
    async fn empty_image_yields_cleared_record_with_stable_hash() {
        let c = collector(None);
        let first = c.create_audit_data("", 400, 200).await;
        let second = c.create_audit_data("", 400, 200).await;

        assert!(first.is_cleared());
        assert_eq!(first.signature_data.signature_length, 0);
        assert_eq!(
            first.signature_data.signature_hash,
            second.signature_data.signature_hash
        );
    }

    #[tokio::test]
    async fn hash_is_a_pure_function_of_the_image() {
        let c = collector(None);
        let img = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk";
        let a = c.create_audit_data(img, 400, 200).await;
        let b = c.create_audit_data(img, 800, 300).await;
        assert_eq!(
            a.signature_data.signature_hash,
            b.signature_data.signature_hash
        );
        assert_ne!(
            a.signature_data.signature_hash,
            c.create_audit_data("", 400, 200)
                .await
                .signature_data
                .signature_hash
        );
    }

    #[tokio::test]
    async fn slow_geolocation_degrades_to_unavailable() {
        let record = collector(Some(Duration::from_secs(30)))
            .with_geolocation_timeout(Duration::from_millis(50))
            .create_audit_data("data:image/png;base64,ABC", 400, 200)
            .await;
        let extended = record.extended.expect("extended telemetry");
        assert_eq!(extended.geolocation, Telemetry::Unavailable);
        assert!(extended.battery.is_available());
    }

    #[test]
    fn locale_normalization() {
        assert_eq!(normalize_locale("pt_BR.UTF-8").as_deref(), Some("pt-BR"));
        assert_eq!(normalize_locale("C"), None);
        assert_eq!(normalize_locale("en_US@euro").as_deref(), Some("en-US"));
    }
}
