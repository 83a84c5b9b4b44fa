use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "query-audit", version, about = "Audit reads of selected database tables")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "query_audit.yaml")]
    pub config: PathBuf,

    /// Audit log destination (overrides config file setting)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Comma-separated table allow-list (overrides config file setting)
    #[arg(long)]
    pub tables: Option<String>,

    /// Comma-separated database allow-list (overrides config file setting)
    #[arg(long)]
    pub databases: Option<String>,

    /// Do not flush after every record
    #[arg(long)]
    pub no_flush: bool,

    /// JSON-lines event feed to replay (defaults to stdin)
    #[arg(short, long)]
    pub feed: Option<PathBuf>,
}
