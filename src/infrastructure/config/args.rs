use super::app_config::LogLevel;
use crate::domain::entities::SourceMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "artwork-catalog",
    version,
    about = "Publishes the images embedded in a spreadsheet workbook as a browsable catalog",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH", global = true)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Workbook source.
    #[arg(long, value_enum, env = "SOURCE_MODE")]
    pub source_mode: Option<SourceMode>,

    /// Local workbook path.
    #[arg(long, value_name = "PATH", env = "LOCAL_XLSX_PATH")]
    pub local_xlsx_path: Option<PathBuf>,

    /// Upper bound for one workbook load, in seconds.
    #[arg(long, env = "GRAPH_TIMEOUT_SECONDS")]
    pub source_timeout_secs: Option<u64>,

    /// Include a digest of the workbook prefix in its identity.
    #[arg(long)]
    pub identity_digest: Option<bool>,

    /// Query parameter that forces a catalog rebuild.
    #[arg(long)]
    pub bypass_query_param: Option<String>,

    /// Regex of worksheet titles to leave out of the catalog.
    #[arg(long)]
    pub ignored_sheet_pattern: Option<String>,

    /// Azure AD tenant.
    #[arg(long, env = "MS_TENANT_ID")]
    pub tenant_id: Option<String>,

    /// Application (client) id.
    #[arg(long, env = "MS_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Application secret.
    #[arg(long, env = "MS_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Drive holding the workbook.
    #[arg(long, env = "GRAPH_DRIVE_ID")]
    pub drive_id: Option<String>,

    /// Drive item of the workbook.
    #[arg(long, env = "GRAPH_ITEM_ID")]
    pub item_id: Option<String>,

    /// SharePoint site holding the workbook.
    #[arg(long, env = "GRAPH_SITE_ID")]
    pub site_id: Option<String>,

    /// Workbook path within the site's default drive.
    #[arg(long, env = "GRAPH_FILE_PATH")]
    pub file_path: Option<String>,

    /// Sharing link or Graph URL of the workbook.
    #[arg(long, env = "MS_FILE_URL", hide_env_values = true)]
    pub file_url: Option<String>,

    /// Microsoft Graph API root.
    #[arg(long, env = "GRAPH_BASE_URL")]
    pub graph_base_url: Option<String>,

    /// Catalog time-to-live in seconds; 0 disables caching.
    #[arg(long, env = "CATALOG_CACHE_TTL")]
    pub catalog_ttl_secs: Option<u64>,

    /// Media cache directory.
    #[arg(long, value_name = "PATH", env = "MEDIA_CACHE_DIR")]
    pub media_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the catalog response.
    Catalog {
        /// Query string of the request, e.g. `refresh=1`.
        #[arg(long, default_value = "")]
        query: String,

        /// Entity tag previously returned for the catalog.
        #[arg(long)]
        if_none_match: Option<String>,
    },
    /// Fetch one cached image.
    Media {
        /// Category slug.
        category: String,

        /// Image filename, `img_<n>.png`.
        filename: String,

        /// Entity tag previously returned for the image.
        #[arg(long)]
        if_none_match: Option<String>,

        /// Write the image to this path instead of printing its size.
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Report whether the workbook source is reachable.
    Health,
}
