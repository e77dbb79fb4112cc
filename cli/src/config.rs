use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
}

/// Signed-in state, persisted as `account.json` in the data directory.
/// Present file == signed in; removing it is sign-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub user_id: String,
    pub server_url: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub api_key: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "nosh").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("nosh.db");

        Ok(Config { db_path, data_dir })
    }

    /// Database backing the `serve` command's document store. Kept apart
    /// from the tracker's own database so one machine can host and track.
    #[must_use]
    pub fn cloud_db_path(&self) -> PathBuf {
        self.data_dir.join("cloud.db")
    }

    fn account_path(&self) -> PathBuf {
        self.data_dir.join("account.json")
    }

    pub fn load_account(&self) -> Result<Option<Account>> {
        let path = self.account_path();
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path).context("Failed to read account file")?;
        let account = serde_json::from_str(&raw).context("Malformed account file")?;
        Ok(Some(account))
    }

    pub fn save_account(&self, account: &Account) -> Result<()> {
        let raw = serde_json::to_string_pretty(account)?;
        std::fs::write(self.account_path(), raw).context("Failed to write account file")?;
        Ok(())
    }

    /// Returns true when there was an account to clear.
    pub fn clear_account(&self) -> Result<bool> {
        let path = self.account_path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove account file")?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Load the server API key from disk, or generate a new one.
    ///
    /// Returns `(key, newly_created)` where `newly_created` is true when a
    /// fresh key was just generated (first run of `serve`).
    pub fn load_or_create_api_key(&self) -> Result<(String, bool)> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok((key, false));
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        Ok((key, true))
    }
}
