use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// ENSRainbow: heal ENS labelhashes back into labels.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply a rainbow file to the label store, creating the store if needed.
    Ingest(IngestArgs),

    /// Serve the HTTP lookup API.
    Serve(ServeArgs),

    /// Check the label store's integrity.
    Validate(ValidateArgs),

    /// Delete the label store directory.
    Purge(PurgeArgs),

    /// Convert a text corpus into a rainbow file.
    Convert(ConvertArgs),
}

#[derive(Args)]
pub struct DataDir {
    /// Label store directory.
    #[arg(long, default_value = "data", env = "ENSRAINBOW_DATA_DIR")]
    pub data_dir: PathBuf,
}

#[derive(Args)]
pub struct IngestArgs {
    /// Rainbow file to ingest.
    #[arg(long)]
    pub input_file: PathBuf,

    #[command(flatten)]
    pub data: DataDir,

    /// Records written per committed batch.
    #[arg(long, default_value_t = ensrainbow_core::ingest::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
}

#[derive(Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub data: DataDir,

    /// Address to bind the web server to.
    #[arg(long, default_value = "127.0.0.1", env = "ENSRAINBOW_BIND")]
    pub bind: String,

    /// Port to listen on.
    #[arg(long, default_value = "3223", env = "ENSRAINBOW_PORT")]
    pub port: u16,
}

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub data: DataDir,

    /// Only check bookkeeping keys instead of rehashing every label.
    #[arg(long)]
    pub lite: bool,
}

#[derive(Args)]
pub struct PurgeArgs {
    #[command(flatten)]
    pub data: DataDir,
}

#[derive(Args)]
pub struct ConvertArgs {
    /// Corpus with one `<labelhash>\t<label>` row or bare label per line.
    #[arg(long)]
    pub input_file: PathBuf,

    /// Rainbow file to write.
    #[arg(long)]
    pub output_file: PathBuf,

    /// Namespace recorded in the rainbow file header.
    #[arg(long)]
    pub namespace: String,

    /// Label set version recorded in the rainbow file header.
    #[arg(long)]
    pub label_set_version: u32,
}
