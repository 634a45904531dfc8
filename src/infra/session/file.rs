use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::debug;

use super::SessionStore;
use crate::session::SessionData;

/// Stores the session as a JSON object on disk:
/// ```json
/// { "token": "4f1c…", "theme": "dark" }
/// ```
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<SessionData>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read session file '{}'", self.path.display()));
            }
        };

        let data = serde_json::from_str(&content)
            .with_context(|| format!("session file '{}' is corrupt", self.path.display()))?;
        Ok(Some(data))
    }

    async fn save(&self, data: &SessionData) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }

        let content = serde_json::to_string_pretty(data)?;
        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("failed to write session file '{}'", self.path.display()))?;
        debug!(path = %self.path.display(), "Session saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Theme;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    #[tokio::test]
    async fn test_missing_file_loads_as_none() {
        let path = temp_path("pest_advisory_test_session_missing.json");
        let _ = fs::remove_file(&path);

        let store = FileSessionStore::new(&path);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = temp_path("pest_advisory_test_session_dir");
        let path = dir.join("session.json");
        let _ = fs::remove_dir_all(&dir);

        let store = FileSessionStore::new(&path);
        let data = SessionData {
            token: Some("abc".into()),
            theme: Theme::Dark,
        };
        store.save(&data).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(data));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let path = temp_path("pest_advisory_test_session_corrupt.json");
        fs::write(&path, "{not json").unwrap();

        let store = FileSessionStore::new(&path);
        assert!(store.load().await.is_err());

        fs::remove_file(&path).unwrap();
    }
}
