use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// On-disk layout root. Defaults to `~/.unified-agent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "d_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            data_dir: d_data_dir(),
        }
    }
}

impl WorkspaceConfig {
    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("sessions")
    }

    pub fn state_file(&self) -> PathBuf {
        self.data_dir.join("gateway-state.json")
    }

    pub fn events_index_file(&self) -> PathBuf {
        self.data_dir.join("sessions.db")
    }

    pub fn env_profiles_file(&self) -> PathBuf {
        self.data_dir.join("env-profiles.json")
    }
}

fn d_data_dir() -> PathBuf {
    dirs_home().join(".unified-agent")
}

/// `dirs`-free home-dir lookup (avoids pulling in another crate for one call).
fn dirs_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}
