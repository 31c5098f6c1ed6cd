use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::keys::KeyStore;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_UPLOAD_PATH: &str = "./data/";
pub const DEFAULT_UPLOAD_URL: &str = "http://localhost:8081/";
pub const DEFAULT_CONFIG_PATH: &str = "./config.json";
pub const UPLOAD_KEY_ENV: &str = "UPLOAD_KEY";

/// One immutable configuration snapshot.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub upload_path: PathBuf,
    pub upload_url: String,
    pub remote_addr_header: Option<String>,
    pub keys: KeyStore,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            upload_path: PathBuf::from(DEFAULT_UPLOAD_PATH),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            remote_addr_header: None,
            keys: KeyStore::new(),
        }
    }
}

impl Config {
    /// Listen address in a form `TcpListener::bind` accepts. A bare `:port`
    /// binds every interface.
    pub fn bind_addr(&self) -> String {
        normalize_listen_addr(&self.listen_addr)
    }
}

pub fn normalize_listen_addr(addr: &str) -> String {
    match addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => addr.to_string(),
    }
}

/// On-disk JSON config. Every field is optional and only overrides the
/// defaults when present.
#[derive(Debug, Default)]
pub struct FileConfig {
    pub listen_address: Option<String>,
    pub upload_path: Option<PathBuf>,
    pub upload_url: Option<String>,
    pub remote_addr_header: Option<String>,
    /// `{ "key": "comment" }`
    pub upload_keys: HashMap<String, String>,
}

impl FileConfig {
    /// Fails only when the text is not a JSON object. A field holding the
    /// wrong type is logged and left unset; the other fields still apply.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let fields: Map<String, Value> = serde_json::from_str(text)?;
        Ok(Self {
            listen_address: field(&fields, "listen_address"),
            upload_path: field(&fields, "upload_path"),
            upload_url: field(&fields, "upload_url"),
            remote_addr_header: field(&fields, "remote_addr_header"),
            upload_keys: upload_keys(&fields),
        })
    }
}

fn field<T: DeserializeOwned>(fields: &Map<String, Value>, name: &str) -> Option<T> {
    let value = fields.get(name)?;
    match Option::<T>::deserialize(value) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(field = name, error = %e, "ignoring config field");
            None
        }
    }
}

fn upload_keys(fields: &Map<String, Value>) -> HashMap<String, String> {
    let entries = match fields.get("upload_keys") {
        None | Some(Value::Null) => return HashMap::new(),
        Some(Value::Object(entries)) => entries,
        Some(other) => {
            tracing::warn!(field = "upload_keys", value = %other, "ignoring config field, expected an object");
            return HashMap::new();
        }
    };

    entries
        .iter()
        .filter_map(|(key, comment)| match comment {
            Value::String(comment) => Some((key.clone(), comment.clone())),
            Value::Null => Some((key.clone(), String::new())),
            other => {
                tracing::warn!(comment = %other, "ignoring upload key with a non-string comment");
                None
            }
        })
        .collect()
}

/// Values given at process start. These always win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub listen_addr: Option<String>,
    pub upload_path: Option<PathBuf>,
    pub upload_url: Option<String>,
    pub remote_addr_header: Option<String>,
}

/// Where a reload reads from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub config_path: PathBuf,
    pub overrides: Overrides,
    /// Environment variable holding extra comma separated keys.
    pub keys_env: String,
}

impl ConfigSource {
    pub fn new(config_path: impl Into<PathBuf>, overrides: Overrides) -> Self {
        Self {
            config_path: config_path.into(),
            overrides,
            keys_env: UPLOAD_KEY_ENV.to_string(),
        }
    }

    /// Assemble a fresh snapshot. Never fails: unreadable or malformed
    /// config files are logged and skipped.
    pub fn build(&self) -> Config {
        let mut config = Config::default();
        let file = read_file_config(&self.config_path).unwrap_or_default();

        if let Some(v) = file.listen_address {
            config.listen_addr = v;
        }
        if let Some(v) = file.upload_path {
            config.upload_path = v;
        }
        if let Some(v) = file.upload_url {
            config.upload_url = v;
        }
        if let Some(v) = file.remote_addr_header.filter(|h| !h.is_empty()) {
            config.remote_addr_header = Some(v);
        }

        let o = &self.overrides;
        if let Some(v) = &o.listen_addr {
            config.listen_addr = v.clone();
        }
        if let Some(v) = &o.upload_path {
            config.upload_path = v.clone();
        }
        if let Some(v) = &o.upload_url {
            config.upload_url = v.clone();
        }
        if let Some(v) = &o.remote_addr_header {
            config.remote_addr_header = Some(v.clone());
        }

        let env_keys = std::env::var(&self.keys_env).ok();
        config.keys = KeyStore::from_sources(&file.upload_keys, env_keys.as_deref());
        config
    }
}

fn read_file_config(path: &Path) -> Option<FileConfig> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return None;
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "error loading config file");
            return None;
        }
    };
    match FileConfig::parse(&text) {
        Ok(file) => Some(file),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "error parsing config file");
            None
        }
    }
}

/// Holds the current snapshot and rebuilds it on demand.
pub struct ConfigStore {
    source: ConfigSource,
    current: ArcSwap<Config>,
}

impl ConfigStore {
    /// Build the first snapshot from `source`.
    pub fn load(source: ConfigSource) -> Self {
        let initial = source.build();
        prepare_storage(&initial.upload_path);
        Self {
            source,
            current: ArcSwap::from_pointee(initial),
        }
    }

    /// Store with a fixed snapshot, never touching the filesystem or the
    /// environment until `reload` is called.
    pub fn with_config(source: ConfigSource, config: Config) -> Self {
        Self {
            source,
            current: ArcSwap::from_pointee(config),
        }
    }

    /// The snapshot in effect right now. Callers hold on to the returned
    /// `Arc` for the whole request.
    pub fn current(&self) -> Arc<Config> {
        self.current.load_full()
    }

    /// Rebuild from the source and publish the result in one swap.
    pub fn reload(&self) -> Arc<Config> {
        let next = Arc::new(self.source.build());
        prepare_storage(&next.upload_path);

        let previous = self.current.swap(Arc::clone(&next));
        if previous.bind_addr() != next.bind_addr() {
            tracing::warn!(
                old = %previous.listen_addr,
                new = %next.listen_addr,
                "listen address changed; restart to apply"
            );
        }
        tracing::info!(
            upload_path = %next.upload_path.display(),
            upload_url = %next.upload_url,
            keys = next.keys.len(),
            "configuration loaded"
        );
        next
    }
}

fn prepare_storage(path: &Path) {
    if let Err(e) = std::fs::create_dir_all(path) {
        tracing::warn!(path = %path.display(), error = %e, "cannot create upload directory");
    }
}
