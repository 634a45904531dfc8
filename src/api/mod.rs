//! Client for the advisory backend: accounts, token validation and
//! prediction records.
//!
//! Unauthenticated calls live on [`AdvisoryClient`]. Calls that need a
//! bearer token go through [`AuthorizedClient`], obtained from
//! [`AdvisoryClient::authorize`] with the current [`crate::session::Session`].

mod client;
mod error;
pub mod types;

pub use client::{AdvisoryClient, AuthorizedClient, signed_in};
pub use error::ApiError;
