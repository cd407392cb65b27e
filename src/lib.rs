//! Userstore is a SQLite-backed storage layer for user accounts.
//!
//! ```no_run
//! use userstore::user::{UserFilter, UserUpdate};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = userstore::initialize_store(None).await?;
//! let user = store.create_user("a@b.com", "hashed").await?;
//! store
//!     .update_user(user.id, &UserUpdate::default().session_id(Some("sid".into())))
//!     .await?;
//! let user = store.find_user_by(&UserFilter::default().session_id(Some("sid".into()))).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod config;
mod database;
pub mod error;
pub mod telemetry;
pub mod user;

use std::path::PathBuf;

use user::UserStore;

/// Read configuration and open the [`UserStore`] it describes.
///
/// `config_path` falls back to `config.yaml` in the working directory.
pub async fn initialize_store(
    config_path: Option<PathBuf>,
) -> Result<UserStore, Box<dyn std::error::Error>> {
    let mut config = config::Configuration::default();
    if let Some(path) = config_path {
        config = config.path(path);
    }
    let config = config.read();

    Ok(UserStore::new(&config.database).await?)
}
