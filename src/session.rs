//! Explicit session context: the advisory API bearer token and the
//! display theme.
//!
//! A [`Session`] is created with [`Session::init`], handed to whatever
//! needs it, and changed only through its methods, each of which writes
//! through to the backing [`SessionStore`].

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::infra::session::SessionStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => f.write_str("light"),
            Theme::Dark => f.write_str("dark"),
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme '{other}' (expected light or dark)")),
        }
    }
}

/// What gets persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub theme: Theme,
}

pub struct Session {
    data: SessionData,
    store: Arc<dyn SessionStore>,
}

impl Session {
    /// Loads the saved session, or starts an empty one if nothing is saved.
    pub async fn init(store: Arc<dyn SessionStore>) -> Result<Self> {
        let data = store.load().await?.unwrap_or_default();
        Ok(Self { data, store })
    }

    pub fn token(&self) -> Option<&str> {
        self.data.token.as_deref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.data.token.is_some()
    }

    pub fn theme(&self) -> Theme {
        self.data.theme
    }

    pub async fn sign_in(&mut self, token: String) -> Result<()> {
        self.data.token = Some(token);
        self.store.save(&self.data).await?;
        info!("Signed in");
        Ok(())
    }

    /// Forgets the token. The theme is kept.
    pub async fn clear(&mut self) -> Result<()> {
        if self.data.token.take().is_some() {
            info!("Session cleared");
        }
        self.store.save(&self.data).await
    }

    pub async fn set_theme(&mut self, theme: Theme) -> Result<()> {
        self.data.theme = theme;
        self.store.save(&self.data).await
    }
}
