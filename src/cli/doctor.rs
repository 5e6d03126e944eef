//! `brokerdesk doctor` - active health diagnostics.
//!
//! Checks the backend and the local audit store and validates configuration
//! to surface problems before a signing session. Each check reports
//! pass/fail with actionable guidance on failures.

use std::path::Path;
use std::sync::Arc;

use crate::api::{BackendClient, BackendHealth, HttpIpLookup};
use crate::audit::PublicIpLookup;
use crate::config::{AuditStoreBackend, Config};
use crate::store::AuditLogStore;

/// Run diagnostic checks and print results.
pub async fn run_doctor_command(config_path: Option<&Path>, strict: bool) -> anyhow::Result<()> {
    println!("Brokerdesk Doctor");
    println!("=================\n");

    let mut passed = 0u32;
    let mut failed = 0u32;

    // ── Configuration checks ──────────────────────────────────

    let config = match Config::from_env_with_toml(config_path) {
        Ok(config) => {
            check(
                "Configuration",
                CheckResult::Pass(format!("backend {}", config.api.base_url)),
                &mut passed,
                &mut failed,
            );
            Some(config)
        }
        Err(e) => {
            check(
                "Configuration",
                CheckResult::Fail(e.to_string()),
                &mut passed,
                &mut failed,
            );
            None
        }
    };

    check(
        "State directory",
        check_state_dir(),
        &mut passed,
        &mut failed,
    );

    // ── Backend and store checks ──────────────────────────────

    match config.as_ref() {
        Some(config) => {
            check(
                "Backend reachability",
                check_backend(config).await,
                &mut passed,
                &mut failed,
            );
            check(
                "Local audit store",
                check_audit_store(config).await,
                &mut passed,
                &mut failed,
            );
            check(
                "Public IP lookup",
                check_ip_lookup(config).await,
                &mut passed,
                &mut failed,
            );
        }
        None => {
            for name in ["Backend reachability", "Local audit store", "Public IP lookup"] {
                check(
                    name,
                    CheckResult::Skip("configuration did not load".to_string()),
                    &mut passed,
                    &mut failed,
                );
            }
        }
    }

    // ── Summary ───────────────────────────────────────────────

    println!();
    println!("  {passed} passed, {failed} failed");

    if failed > 0 {
        println!("\n  Signing still works offline; failed remote writes stay in the local log.");
        if strict {
            anyhow::bail!("doctor strict mode failed with {failed} check(s)");
        }
    }

    Ok(())
}

// ── Individual checks ───────────────────────────────────────

fn check(name: &str, result: CheckResult, passed: &mut u32, failed: &mut u32) {
    match result {
        CheckResult::Pass(detail) => {
            *passed += 1;
            println!("  [pass] {name}: {detail}");
        }
        CheckResult::Fail(detail) => {
            *failed += 1;
            println!("  [FAIL] {name}: {detail}");
        }
        CheckResult::Skip(reason) => {
            println!("  [skip] {name}: {reason}");
        }
    }
}

enum CheckResult {
    Pass(String),
    Fail(String),
    Skip(String),
}

fn check_state_dir() -> CheckResult {
    let dir = crate::bootstrap::brokerdesk_base_dir();
    if dir.is_dir() {
        CheckResult::Pass(format!("{}", dir.display()))
    } else if dir.exists() {
        CheckResult::Fail(format!("{} exists but is not a directory", dir.display()))
    } else {
        CheckResult::Pass(format!(
            "{} not found (will be created on first run)",
            dir.display()
        ))
    }
}

async fn check_backend(config: &Config) -> CheckResult {
    let health = match BackendClient::from_config(&config.api) {
        Ok(client) => client.health().await,
        Err(e) => BackendHealth::failed(&config.api.base_url, &e),
    };
    let auth = if config.api.auth_token.is_some() {
        "token set"
    } else {
        "no token"
    };
    if health.is_healthy() {
        CheckResult::Pass(format!("{} ({}, {})", health.url, health.detail, auth))
    } else {
        CheckResult::Fail(format!(
            "{} [{}] {}; check BROKERDESK_API_BASE_URL and BROKERDESK_API_TOKEN",
            health.url,
            health.state.as_str(),
            health.detail
        ))
    }
}

async fn check_audit_store(config: &Config) -> CheckResult {
    let store_config = &config.audit_store;
    if store_config.backend == AuditStoreBackend::Memory {
        return CheckResult::Skip("in-memory store (events are lost on exit)".to_string());
    }

    let store: Arc<dyn AuditLogStore> = match crate::store::open_store(store_config).await {
        Ok(store) => store,
        Err(e) => return CheckResult::Fail(format!("cannot open: {e}")),
    };

    match store.read_all().await {
        Ok(entries) => CheckResult::Pass(format!(
            "{} event(s) in {}",
            entries.len(),
            store_config.path.display()
        )),
        Err(e) => CheckResult::Fail(format!(
            "cannot read {}: {e}",
            store_config.path.display()
        )),
    }
}

async fn check_ip_lookup(config: &Config) -> CheckResult {
    if !config.telemetry.ip_lookup_enabled {
        return CheckResult::Skip("disabled (BROKERDESK_IP_LOOKUP_ENABLED=false)".to_string());
    }

    let lookup = match HttpIpLookup::new(
        config.telemetry.ip_lookup_url.clone(),
        config.api.timeout(),
    ) {
        Ok(lookup) => lookup,
        Err(e) => return CheckResult::Fail(format!("HTTP client init failed: {e}")),
    };

    match lookup.lookup().await {
        Some(ip) => CheckResult::Pass(ip),
        // Audit records simply omit the IP in this case.
        None => CheckResult::Fail(format!(
            "no address from {}",
            config.telemetry.ip_lookup_url
        )),
    }
}
