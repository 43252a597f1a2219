use std::path::PathBuf;

use serde::Deserialize;
use sg_loader::LoaderConfig;

fn default_tenant() -> String {
    "demo-tenant".to_owned()
}

fn default_preload_depth() -> usize {
    3
}

/// Top-level configuration for the demo binary (`SPEC_FULL.md` §2, "ambient stack").
///
/// Loaded from an optional TOML file via `--config`; every field has a default so an empty file
/// (or no file at all) is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TopLevelConfig {
    #[serde(default = "default_tenant")]
    pub tenant: String,

    /// Batches kept in flight ahead of the consumer (`spec.md` §4.3); must be at least 2.
    #[serde(default = "default_preload_depth")]
    pub preload_depth: usize,

    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub object_store: ObjectStoreConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for TopLevelConfig {
    fn default() -> Self {
        Self {
            tenant: default_tenant(),
            preload_depth: default_preload_depth(),
            loader: LoaderConfig::default(),
            object_store: ObjectStoreConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl TopLevelConfig {
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| anyhow::anyhow!("reading config file {}: {err}", path.display()))?;
        toml::from_str(&raw).map_err(|err| anyhow::anyhow!("parsing config file {}: {err}", path.display()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum ObjectStoreConfig {
    InMemory,
    LocalFs { root: PathBuf },
    Http { base_url: String },
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self::InMemory
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum CacheConfig {
    InMemory,
    None,
    Memcached { address: String },
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::InMemory
    }
}
