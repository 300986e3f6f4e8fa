// Runtime configuration, read from the environment (and `.env`, loaded in main).

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory for the database and pending submissions.
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub policy_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let data_dir = env::var("SCRIPTHOST_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));

        let database_path = env::var("SCRIPTHOST_DATABASE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("scripthost.db"));

        let policy_path = env::var("SCRIPTHOST_POLICY_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("policy.json"));

        Self {
            data_dir,
            database_path,
            policy_path,
        }
    }

    /// Where a library waiting for its name is parked between the two calls.
    pub fn pending_path(&self, account_id: u64) -> PathBuf {
        self.data_dir.join(format!("pending-{}.json", account_id))
    }
}
