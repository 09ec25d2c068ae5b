//! Credential refresh coordination.

mod config;
mod coordinator;

pub use config::CredentialsConfig;
pub use coordinator::{
    refresh_if_missing, CookieExporter, CredentialRefresher, RefreshError, RefreshOutcome,
};
