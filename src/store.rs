use std::{
    fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{bail, Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::OverlayConfig;

const SHORT_ID_LEN: usize = 6;
const SHORT_ID_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// One stored config document, addressable by short ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredConfig {
    pub id: String,
    #[serde(flatten)]
    pub config: OverlayConfig,
    #[serde(default)]
    pub created_at: u64,
}

/// File-backed store of shareable overlay configs: one pretty JSON
/// file per short ID under the OS config dir.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn open_default() -> Result<Self> {
        let dir = dirs::config_dir()
            .context("unable to locate OS config directory")?
            .join("multichat-overlay")
            .join("configs");
        Self::open(dir)
    }

    pub fn open(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed creating config store at {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Saves a config under a fresh short ID and returns the ID.
    /// Collisions with existing files are re-rolled.
    pub fn save(&self, config: &OverlayConfig) -> Result<String> {
        let mut id = generate_short_id();
        while self.path_for(&id)?.exists() {
            id = generate_short_id();
        }
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        let doc = StoredConfig {
            id: id.clone(),
            config: config.clone(),
            created_at,
        };
        let payload =
            serde_json::to_string_pretty(&doc).context("failed serializing stored config")?;
        let path = self.path_for(&id)?;
        fs::write(&path, payload)
            .with_context(|| format!("failed writing {}", path.display()))?;
        Ok(id)
    }

    pub fn load(&self, id: &str) -> Result<Option<OverlayConfig>> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        let doc = serde_json::from_str::<StoredConfig>(&text)
            .with_context(|| format!("invalid stored config at {}", path.display()))?;
        Ok(Some(doc.config))
    }

    /// IDs become file names, so anything outside the short-ID
    /// alphabet is rejected before path construction.
    pub fn path_for(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty()
            || id.len() > 64
            || !id
                .bytes()
                .all(|byte| byte.is_ascii_lowercase() || byte.is_ascii_digit())
        {
            bail!("invalid config id: {id:?}");
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

pub fn generate_short_id() -> String {
    let mut rng = rand::thread_rng();
    (0..SHORT_ID_LEN)
        .map(|_| SHORT_ID_CHARS[rng.gen_range(0..SHORT_ID_CHARS.len())] as char)
        .collect()
}
