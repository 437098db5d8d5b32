//! lzstack-deploy - deploy one stack across landing-zone accounts.
//!
//! Reads an invocation request (camelCase JSON), resolves its targets against
//! the account directory named in the request, upserts the stack on each
//! target and prints the batch report to stdout.
//!
//! # Usage
//!
//! ```text
//! LZ_HOME_ACCOUNT_ID=111111111111 lzstack-deploy request.json
//! ```
//!
//! Relative template paths resolve against the request file's directory.
//!
//! # Exit status
//!
//! | Code | Meaning |
//! |------|---------|
//! | `0` | every target succeeded or was skipped |
//! | `1` | at least one target failed |
//! | `2` | setup failed (bad request, directory load, missing template, configuration) |
//!
//! # Environment Variables
//!
//! See [`LzConfig::from_env`]; additionally `RUST_LOG` overrides `LOG_LEVEL`
//! and `LOG_FORMAT=json` switches to JSON log lines.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use lzstack_aws::{AwsTemplateStore, CloudFormationStackProvider, StsTrustProvider, load_sdk_config};
use lzstack_core::{
    FileTemplateStore, InMemoryStackProvider, InvocationContext, LzConfig, ProviderKind,
    StaticTrustProvider, handle_invocation,
};
use lzstack_model::{BatchReport, InvocationRequest, UpsertResult};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
/// Logs go to stderr so stdout carries only the report.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

fn read_request(path: &Path) -> Result<InvocationRequest> {
    let raw = std::fs::read(path)
        .with_context(|| format!("failed to read request {}", path.display()))?;
    serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse request {}", path.display()))
}

async fn build_context(config: LzConfig, template_dir: PathBuf) -> InvocationContext {
    let files = FileTemplateStore::with_base_dir(template_dir);
    match config.provider {
        ProviderKind::Aws => {
            let sdk_config = load_sdk_config(&config).await;
            InvocationContext {
                trust: Arc::new(StsTrustProvider::new(&sdk_config)),
                templates: Arc::new(AwsTemplateStore::new(&sdk_config, files)),
                provider: Arc::new(CloudFormationStackProvider::new(sdk_config)),
                config,
            }
        }
        ProviderKind::Memory => InvocationContext {
            trust: Arc::new(StaticTrustProvider::new()),
            templates: Arc::new(files),
            provider: Arc::new(InMemoryStackProvider::new()),
            config,
        },
    }
}

fn exit_code(report: &BatchReport<UpsertResult>) -> u8 {
    u8::from(!report.is_success())
}

async fn run(config: LzConfig) -> Result<BatchReport<UpsertResult>> {
    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        bail!("usage: lzstack-deploy <request.json>");
    };
    let request = read_request(&path)?;
    let template_dir = path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    info!(
        stack_name = %request.stack_name,
        home_account_id = %config.home_account_id,
        home_region = %config.home_region,
        provider = ?config.provider,
        version = VERSION,
        "starting lzstack deploy",
    );

    let context = build_context(config, template_dir).await;
    let report = handle_invocation(&request, &context).await?;
    Ok(report)
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = LzConfig::from_env();
    if let Err(e) = init_tracing(&config.log_level) {
        eprintln!("{e:#}");
        return ExitCode::from(2);
    }

    match run(config).await {
        Ok(report) => {
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => error!(error = %e, "failed to render report"),
            }
            ExitCode::from(exit_code(&report))
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "deploy failed");
            ExitCode::from(2)
        }
    }
}
