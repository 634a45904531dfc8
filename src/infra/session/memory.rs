use anyhow::Result;
use std::sync::Mutex;

use super::SessionStore;
use crate::session::SessionData;

#[derive(Default)]
pub struct MemorySessionStore {
    data: Mutex<Option<SessionData>>,
}

impl MemorySessionStore {
    pub fn new(initial: Option<SessionData>) -> Self {
        Self {
            data: Mutex::new(initial),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<SessionData>> {
        // Poisoning is ignored: every save replaces the value whole.
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<SessionData>> {
        Ok(self.slot().clone())
    }

    async fn save(&self, data: &SessionData) -> Result<()> {
        *self.slot() = Some(data.clone());
        Ok(())
    }
}
