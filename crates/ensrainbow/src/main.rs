mod cli;
mod server;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use eyre::{bail, eyre, WrapErr};

use ensrainbow_core::codec::{LabelSetHeader, RainbowReader, RainbowWriter};
use ensrainbow_core::ingest::{ingest_with, IngestOptions};
use ensrainbow_core::validate::REMEDIATION;
use ensrainbow_core::{IngestError, LabelDb, LookupService, StoreError, ValidationMode};

use cli::{Command, ConvertArgs, IngestArgs, PurgeArgs, ServeArgs, ValidateArgs};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    match args.command {
        Command::Ingest(args) => run_ingest(args),
        Command::Serve(args) => run_serve(args).await,
        Command::Validate(args) => run_validate(args),
        Command::Purge(args) => run_purge(args),
        Command::Convert(args) => run_convert(args),
    }
}

fn run_ingest(args: IngestArgs) -> eyre::Result<()> {
    let data_dir = &args.data.data_dir;
    let db = LabelDb::open_or_create(data_dir)
        .map_err(|err| eyre!(format_store_error(data_dir, &err)))
        .wrap_err("while opening the label store for ingestion")?;

    let file = File::open(&args.input_file)
        .wrap_err_with(|| format!("open rainbow file {}", args.input_file.display()))?;
    let mut reader = RainbowReader::new(BufReader::new(file))
        .wrap_err_with(|| format!("read rainbow file header of {}", args.input_file.display()))?;

    let options = IngestOptions::default().with_batch_size(args.batch_size);
    match ingest_with(&db, &mut reader, &options) {
        Ok(summary) => {
            tracing::info!(
                namespace = %summary.label_set.namespace,
                label_set_version = summary.label_set.label_set_version,
                records_added = summary.records_added,
                total_records = summary.total_records,
                "label set applied"
            );
            Ok(())
        }
        Err(err) => {
            if ingestion_left_store_unfinished(&err) {
                tracing::error!(path = %data_dir.display(), remediation = REMEDIATION, "ingestion aborted");
            }
            Err(err).wrap_err_with(|| format!("ingest {}", args.input_file.display()))
        }
    }
}

async fn run_serve(args: ServeArgs) -> eyre::Result<()> {
    let data_dir = &args.data.data_dir;
    let db = LabelDb::open(data_dir)
        .map_err(|err| eyre!(format_store_error(data_dir, &err)))
        .wrap_err("while opening the label store to serve")?;

    if !ensrainbow_core::validate(&db, ValidationMode::Lite) {
        bail!(
            "label store at {} failed lite validation; {REMEDIATION}",
            data_dir.display()
        );
    }

    let state = server::AppState {
        lookup: LookupService::new(Arc::new(db)),
        version: env!("CARGO_PKG_VERSION"),
    };
    let router = server::build_router(state);

    let bind_addr = format!("{}:{}", args.bind, args.port);
    if args.bind == "0.0.0.0" {
        tracing::warn!("server is bound to 0.0.0.0 — it is accessible from the network");
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .wrap_err_with(|| format!("bind TCP listener on {bind_addr}"))?;

    tracing::info!("listening on {bind_addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("run HTTP server")?;

    tracing::info!("server stopped");
    Ok(())
}

fn run_validate(args: ValidateArgs) -> eyre::Result<()> {
    let data_dir = &args.data.data_dir;
    let db = LabelDb::open(data_dir)
        .map_err(|err| eyre!(format_store_error(data_dir, &err)))
        .wrap_err("while opening the label store for validation")?;

    let mode = if args.lite {
        ValidationMode::Lite
    } else {
        ValidationMode::Full
    };
    if !ensrainbow_core::validate(&db, mode) {
        bail!("label store at {} failed {mode} validation", data_dir.display());
    }
    Ok(())
}

fn run_purge(args: PurgeArgs) -> eyre::Result<()> {
    let data_dir = &args.data.data_dir;
    ensrainbow_core::purge(data_dir)
        .map_err(|err| eyre!(format_store_error(data_dir, &err)))
        .wrap_err("while purging the label store")
}

fn run_convert(args: ConvertArgs) -> eyre::Result<()> {
    let input = File::open(&args.input_file)
        .wrap_err_with(|| format!("open corpus {}", args.input_file.display()))?;
    let output = File::create(&args.output_file)
        .wrap_err_with(|| format!("create rainbow file {}", args.output_file.display()))?;

    let header = LabelSetHeader::new(args.namespace, args.label_set_version);
    let mut writer =
        RainbowWriter::new(BufWriter::new(output), &header).wrap_err("write rainbow file header")?;
    let stats = ensrainbow_core::convert::convert(BufReader::new(input), &mut writer)
        .wrap_err_with(|| format!("convert {}", args.input_file.display()))?;

    tracing::info!(
        output = %args.output_file.display(),
        written = stats.written,
        skipped_mismatched = stats.skipped_mismatched,
        skipped_malformed = stats.skipped_malformed,
        "rainbow file written"
    );
    Ok(())
}

/// Errors after the order checks pass leave the unfinished flag set.
fn ingestion_left_store_unfinished(err: &IngestError) -> bool {
    matches!(
        err,
        IngestError::Io(_)
            | IngestError::Codec(_)
            | IngestError::Store(_)
            | IngestError::HashMismatch { .. }
    )
}

fn format_store_error(data_dir: &Path, err: &StoreError) -> String {
    let mut lines = vec![
        format!("label store error in `{}`", data_dir.display()),
        format!("error: {err}"),
    ];

    match err {
        StoreError::NotFound(_) => lines.push(
            "hint: no store exists here yet; run `ensrainbow ingest` with label set 0 first, \
             or point --data-dir at an existing store"
                .into(),
        ),
        StoreError::Locked(_) => lines.push(
            "hint: another ensrainbow process has this store open; stop it and retry".into(),
        ),
        StoreError::AlreadyExists(_) => lines.push(
            "hint: the directory is not empty; choose another --data-dir or purge it".into(),
        ),
        StoreError::SchemaMismatch { .. } | StoreError::Corrupt { .. } => {
            lines.push(format!("hint: {REMEDIATION}"))
        }
        StoreError::Io(io) if io.kind() == std::io::ErrorKind::PermissionDenied => lines.push(
            "hint: permission denied; check that this user can read and write the data directory"
                .into(),
        ),
        StoreError::Io(_) | StoreError::Backend(_) => {}
    }

    lines.join("\n")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
