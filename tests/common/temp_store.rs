use std::path::Path;
use std::path::PathBuf;

use rand::distr::Alphanumeric;
use rand::distr::SampleString;

/// A randomly named directory under the system temp dir, so filesystem-bound
/// tests can run in parallel. Removed on drop.
pub struct TempDataDir {
    path: PathBuf,
}

impl TempDataDir {
    pub fn new() -> Self {
        let mut rng = rand::rng();
        let user = std::env::var("USER").unwrap_or_else(|_| "default".to_string());
        let path = std::env::temp_dir()
            .join(format!("walletforge-integration-tests-{}", user))
            .join(Alphanumeric.sample_string(&mut rng, 16));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn wallet_db_path(&self) -> PathBuf {
        self.path.join("wallet_db")
    }
}

impl Drop for TempDataDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}
