use std::path::{Path, PathBuf};

pub const CLIENT_SECRET_FILE: &str = "credentials.json";
pub const TOKEN_FILE: &str = "token.json";

/// Where the OAuth client secret and the cached token live.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthPaths {
    pub client_secret: PathBuf,
    pub token: PathBuf,
}

impl AuthPaths {
    /// Default locations sit next to the running executable.
    pub fn beside_executable() -> Self {
        let base = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::in_dir(&base)
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self {
            client_secret: dir.join(CLIENT_SECRET_FILE),
            token: dir.join(TOKEN_FILE),
        }
    }

    /// Applies explicit overrides on top of the defaults.
    pub fn with_overrides(mut self, client_secret: Option<PathBuf>, token: Option<PathBuf>) -> Self {
        if let Some(path) = client_secret {
            self.client_secret = path;
        }
        if let Some(path) = token {
            self.token = path;
        }
        self
    }
}
