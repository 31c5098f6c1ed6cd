use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::ServerLimits;
use crate::config::{DEFAULT_CONFIG_PATH, Overrides};

#[derive(Debug, Parser)]
#[command(
    name = "filedrop",
    about = "FileDrop: minimal file upload service with an Imgur-compatible endpoint",
    version,
    author
)]
pub struct Cli {
    /// Address to listen on for HTTP (overrides config option)
    #[arg(long)]
    pub listen: Option<String>,

    /// Directory uploaded files are written to (overrides config option)
    #[arg(long)]
    pub upload_path: Option<PathBuf>,

    /// Base URL the uploaded files are served from (overrides config option)
    #[arg(long)]
    pub upload_url: Option<String>,

    /// Header holding the client address, e.g. X-Forwarded-For (overrides config option)
    #[arg(long)]
    pub remote_addr_header: Option<String>,

    /// Path to the JSON config file, re-read on SIGHUP
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config_path: PathBuf,

    /// Largest accepted request body in bytes
    #[arg(long, default_value_t = 256 * 1024 * 1024)]
    pub max_upload_size: usize,

    /// Timeout for fetching remote URLs, in seconds
    #[arg(long, default_value_t = 30)]
    pub fetch_timeout: u64,

    /// Timeout for a whole request, in seconds
    #[arg(long, default_value_t = 300)]
    pub request_timeout: u64,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            listen_addr: self.listen.clone().filter(|v| !v.is_empty()),
            upload_path: self.upload_path.clone().filter(|v| !v.as_os_str().is_empty()),
            upload_url: self.upload_url.clone().filter(|v| !v.is_empty()),
            remote_addr_header: self.remote_addr_header.clone().filter(|v| !v.is_empty()),
        }
    }

    pub fn limits(&self) -> ServerLimits {
        ServerLimits {
            max_upload_size: self.max_upload_size,
            request_timeout: Duration::from_secs(self.request_timeout),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }
}
