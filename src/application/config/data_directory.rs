use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use directories::ProjectDirs;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;

/// Directory of the wallet LevelDB database inside the data directory.
pub const WALLET_DB_DIR_NAME: &str = "wallet_db";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDirectory {
    data_dir: PathBuf,
}

impl DataDirectory {
    /// Use `root_dir` if given, otherwise the platform's data directory for
    /// walletforge.
    pub fn get(root_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match root_dir {
            Some(dir) => dir,
            None => ProjectDirs::from("org", "walletforge", "walletforge")
                .context("Could not determine data directory")?
                .data_dir()
                .to_path_buf(),
        };

        info!("using data directory {}", data_dir.display());
        Ok(Self { data_dir })
    }

    /// Create the directory if it does not exist yet.
    pub async fn create_dir_if_not_exists(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .with_context(|| format!("Failed to create data directory {}", self.data_dir.display()))
    }

    pub fn root_dir_path(&self) -> &Path {
        &self.data_dir
    }

    pub fn wallet_database_dir_path(&self) -> PathBuf {
        self.data_dir.join(WALLET_DB_DIR_NAME)
    }
}

impl std::fmt::Display for DataDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.data_dir.display())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn explicit_root_is_used_verbatim() {
        let dir = DataDirectory::get(Some(PathBuf::from("/tmp/forge"))).unwrap();
        assert_eq!(Path::new("/tmp/forge"), dir.root_dir_path());
        assert_eq!(
            PathBuf::from("/tmp/forge/wallet_db"),
            dir.wallet_database_dir_path()
        );
    }
}
