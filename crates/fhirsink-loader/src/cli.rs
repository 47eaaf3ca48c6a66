use clap::Parser;
use std::path::PathBuf;

use crate::config::ErrorPolicy;

#[derive(Parser)]
#[command(name = "fhirsink")]
#[command(about = "Load FHIR bundle files into a normalized PostgreSQL schema")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file (TOML)
    #[arg(short, long, env = "FHIRSINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory containing bundle .json files (overrides config)
    #[arg(short, long, env = "FHIRSINK_SOURCE")]
    pub source: Option<PathBuf>,

    /// What to do when a bundle's input is corrupt (overrides config)
    #[arg(long, value_enum)]
    pub on_error: Option<ErrorPolicy>,

    /// Create the tables before loading
    #[arg(long)]
    pub init_schema: bool,
}
