//! CLI command handling.
//!
//! Provides subcommands for:
//! - Capturing and clearing signatures (`sign`, `clear`)
//! - Inspecting and replaying the event log (`events`, `sync`, `clear-local`)
//! - Resolving a contract's signing state (`status`)
//! - Active health diagnostics (`doctor`)

mod doctor;

use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::api::{BackendClient, ContractStore, HttpIpLookup, ModifyVerdict};
use crate::audit::{AuditFingerprintCollector, HostEnvironment, SignatureEventLog};
use crate::config::Config;
use crate::contract::{
    ContractAction, ContractLifecycleGate, ContractSignatureState, ContractSignatureStateResolver,
    ContractStatus, Party,
};
use crate::error::{Error, GateError};
use crate::signing::SigningWorkflow;

pub use self::doctor::run_doctor_command;

const DEFAULT_CANVAS_WIDTH: u32 = 400;
const DEFAULT_CANVAS_HEIGHT: u32 = 200;

#[derive(Parser, Debug)]
#[command(name = "brokerdesk")]
#[command(about = "Contract signature audit trail for the brokerage back office")]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file (default: ~/.brokerdesk/config.toml)
    #[arg(long, global = true, env = "BROKERDESK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Capture a signature for one party and log the audit event
    Sign {
        /// Contract ID
        #[arg(long)]
        contract: String,

        /// Signing party (client or broker)
        #[arg(long, value_parser = parse_party)]
        party: Party,

        /// Signature image: a data URL file, an image file, or `-` for stdin
        #[arg(long)]
        image: PathBuf,

        /// Canvas width in pixels
        #[arg(long, default_value_t = DEFAULT_CANVAS_WIDTH)]
        width: u32,

        /// Canvas height in pixels
        #[arg(long, default_value_t = DEFAULT_CANVAS_HEIGHT)]
        height: u32,

        /// Also write the signature onto the contract
        #[arg(long)]
        persist: bool,
    },

    /// Record that a party's signature was cleared
    Clear {
        #[arg(long)]
        contract: String,

        #[arg(long, value_parser = parse_party)]
        party: Party,
    },

    /// List logged signature events
    Events {
        /// Read from the backend instead of the local log
        #[arg(long)]
        remote: bool,

        /// Only events for this contract
        #[arg(long)]
        contract: Option<String>,
    },

    /// Replay every local event to the backend (no deduplication)
    Sync,

    /// Erase the local event log
    ClearLocal {
        /// Confirm the irreversible erase
        #[arg(long)]
        yes: bool,
    },

    /// Show the resolved signing state of a contract
    Status {
        /// Contract ID
        contract_id: String,
    },

    /// Check backend reachability and local store health
    Doctor {
        /// Exit non-zero when any check fails
        #[arg(long)]
        strict: bool,
    },
}

fn parse_party(raw: &str) -> Result<Party, String> {
    Party::parse(raw).ok_or_else(|| format!("unknown party '{raw}' (expected client or broker)"))
}

/// Wired components for one CLI invocation.
struct App {
    client: Arc<BackendClient>,
    events: Arc<SignatureEventLog>,
    resolver: ContractSignatureStateResolver,
    gate: ContractLifecycleGate,
    workflow: SigningWorkflow,
}

impl App {
    async fn connect(config: &Config) -> anyhow::Result<Self> {
        let client = Arc::new(BackendClient::from_config(&config.api).map_err(Error::from)?);
        let local = crate::store::open_store(&config.audit_store)
            .await
            .map_err(Error::from)?;
        let events = Arc::new(SignatureEventLog::new(local, client.clone()));

        let mut collector = AuditFingerprintCollector::new(Arc::new(HostEnvironment::detect(
            config.telemetry.page_url.clone(),
        )))
        .with_geolocation_timeout(config.telemetry.geolocation_timeout());
        if config.telemetry.ip_lookup_enabled {
            match HttpIpLookup::new(config.telemetry.ip_lookup_url.clone(), config.api.timeout()) {
                Ok(lookup) => collector = collector.with_ip_lookup(Arc::new(lookup)),
                Err(e) => tracing::debug!("Public IP lookup disabled: {}", e),
            }
        }

        Ok(Self {
            resolver: ContractSignatureStateResolver::new(client.clone()),
            gate: ContractLifecycleGate::new(client.clone()),
            workflow: SigningWorkflow::new(collector, events.clone(), client.clone()),
            client,
            events,
        })
    }
}

/// Run one parsed command.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_deref();

    if let Command::Doctor { strict } = cli.command {
        return run_doctor_command(config_path, strict).await;
    }

    let config = Config::from_env_with_toml(config_path).map_err(Error::from)?;
    let app = App::connect(&config).await?;

    match cli.command {
        Command::Sign {
            contract,
            party,
            image,
            width,
            height,
            persist,
        } => {
            let image = read_signature_image(&image)?;
            run_capture(&app, &contract, party, &image, width, height, persist).await
        }
        Command::Clear { contract, party } => {
            run_capture(
                &app,
                &contract,
                party,
                "",
                DEFAULT_CANVAS_WIDTH,
                DEFAULT_CANVAS_HEIGHT,
                false,
            )
            .await
        }
        Command::Events { remote, contract } => run_events(&app, remote, contract).await,
        Command::Sync => {
            let report = app.events.sync_local_with_remote().await.map_err(Error::from)?;
            print_json(&report)?;
            if report.failed > 0 {
                anyhow::bail!("{} of {} events failed to sync", report.failed, report.attempted);
            }
            Ok(())
        }
        Command::ClearLocal { yes } => {
            if !yes {
                anyhow::bail!("refusing to erase the local event log without --yes");
            }
            app.events.clear_local().await.map_err(Error::from)?;
            println!("Local signature event log cleared.");
            Ok(())
        }
        Command::Status { contract_id } => run_status(&app, &contract_id).await,
        Command::Doctor { .. } => Ok(()),
    }
}

async fn run_capture(
    app: &App,
    contract_id: &str,
    party: Party,
    image: &str,
    width: u32,
    height: u32,
    persist: bool,
) -> anyhow::Result<()> {
    let contract = app
        .client
        .get_contract(contract_id)
        .await
        .map_err(Error::from)?;

    if persist {
        app.gate
            .authorize(&contract, ContractAction::ReSign)
            .await
            .map_err(Error::from)?;
    }

    let capture = app
        .workflow
        .record(&contract, party, image, width, height)
        .await
        .map_err(Error::from)?;

    if persist {
        app.workflow
            .persist(contract_id, &capture)
            .await
            .map_err(Error::from)?;
    }

    print_json(&capture.entry)
}

async fn run_events(app: &App, remote: bool, contract: Option<String>) -> anyhow::Result<()> {
    let entries = if remote {
        app.events.get_remote_events(contract.as_deref()).await
    } else {
        let mut entries = app.events.get_local_events().await.map_err(Error::from)?;
        if let Some(contract) = contract.as_deref() {
            entries.retain(|entry| entry.contract_id.as_deref() == Some(contract));
        }
        entries
    };
    print_json(&entries)
}

#[derive(Debug, Serialize)]
struct StatusReport {
    status: ContractStatus,
    #[serde(flatten)]
    state: ContractSignatureState,
    digitally_signed: bool,
    physically_signed: bool,
    /// `None` when the backend verdict could not be obtained.
    verdict: Option<ModifyVerdict>,
}

async fn run_status(app: &App, contract_id: &str) -> anyhow::Result<()> {
    let contract = app
        .client
        .get_contract(contract_id)
        .await
        .map_err(Error::from)?;
    let state = app.resolver.resolve(&contract).await;

    let verdict = match app.gate.can_modify(contract_id).await {
        Ok(verdict) => Some(verdict),
        Err(GateError::VerdictUnavailable { source, .. }) => {
            tracing::warn!(contract_id, "Modification verdict unavailable: {}", source);
            None
        }
        Err(e) => return Err(Error::from(e).into()),
    };

    print_json(&StatusReport {
        status: contract.status,
        digitally_signed: ContractLifecycleGate::is_digitally_signed(&contract),
        physically_signed: ContractLifecycleGate::is_physically_signed(&contract),
        state,
        verdict,
    })
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Load a signature image as a data URL.
///
/// Text input that already is a data URL is used verbatim; anything else is
/// treated as raw image bytes and base64-encoded.
fn read_signature_image(path: &Path) -> anyhow::Result<String> {
    let bytes = if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("failed to read signature image from stdin")?;
        buf
    } else {
        std::fs::read(path)
            .with_context(|| format!("failed to read signature image {}", path.display()))?
    };

    if let Ok(text) = std::str::from_utf8(&bytes) {
        let text = text.trim();
        if text.starts_with("data:") {
            return Ok(text.to_string());
        }
    }

    Ok(format!(
        "data:{};base64,{}",
        image_mime(path, &bytes),
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    ))
}

fn image_mime(path: &Path, bytes: &[u8]) -> &'static str {
    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
    if bytes.starts_with(PNG_MAGIC) {
        return "image/png";
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg";
    }
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("svg") => "image/svg+xml",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn sign_arguments_parse() {
        let cli = Cli::try_parse_from([
            "brokerdesk",
            "sign",
            "--contract",
            "42",
            "--party",
            "Broker",
            "--image",
            "-",
            "--persist",
        ])
        .unwrap();
        match cli.command {
            Command::Sign {
                contract,
                party,
                width,
                height,
                persist,
                ..
            } => {
                assert_eq!(contract, "42");
                assert_eq!(party, Party::Broker);
                assert_eq!((width, height), (400, 200));
                assert!(persist);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_party_is_rejected() {
        assert!(
            Cli::try_parse_from([
                "brokerdesk",
                "clear",
                "--contract",
                "1",
                "--party",
                "witness"
            ])
            .is_err()
        );
    }

    #[test]
    fn data_url_files_are_used_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sig.txt");
        std::fs::write(&path, "data:image/png;base64,ABC\n").unwrap();
        assert_eq!(
            read_signature_image(&path).unwrap(),
            "data:image/png;base64,ABC"
        );
    }

    #[test]
    fn binary_images_are_encoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sig.bin");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nrest").unwrap();
        let data_url = read_signature_image(&path).unwrap();
        assert!(data_url.starts_with("data:image/png;base64,"));
        assert_eq!(
            crate::audit::record::inspect_data_url(&data_url),
            Some(("image/png".to_string(), 12))
        );
    }
}
