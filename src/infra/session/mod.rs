//! Persistence for the session context.
//!
//! [`SessionStore`] is the async trait the session loads from and saves to.
//! [`FileSessionStore`] keeps it in a JSON file; [`MemorySessionStore`]
//! keeps it in memory for tests and one-shot runs.

mod file;
mod memory;

pub use file::FileSessionStore;
pub use memory::MemorySessionStore;

use anyhow::Result;

use crate::session::SessionData;

#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns `None` when nothing has been saved yet.
    async fn load(&self) -> Result<Option<SessionData>>;
    async fn save(&self, data: &SessionData) -> Result<()>;
}
