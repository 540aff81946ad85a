//! Settings database access
//!
//! Read/write settings from the settings table (key-value store). The
//! inventory backend connection is stored as three string keys.

use crate::types::ApiConfig;
use crate::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tracing::debug;

pub const KEY_API_DOMAIN: &str = "api_domain";
pub const KEY_BRANCH: &str = "branch";
pub const KEY_API_KEY: &str = "api_key";

/// Load the backend connection settings
///
/// Keys that were never saved read as empty strings.
pub async fn load_api_config(db: &Pool<Sqlite>) -> Result<ApiConfig> {
    let domain = get_setting::<String>(db, KEY_API_DOMAIN).await?.unwrap_or_default();
    let branch = get_setting::<String>(db, KEY_BRANCH).await?.unwrap_or_default();
    let api_key = get_setting::<String>(db, KEY_API_KEY).await?.unwrap_or_default();

    Ok(ApiConfig {
        domain,
        branch,
        api_key,
    })
}

/// Save all three backend connection settings atomically
pub async fn save_api_config(db: &Pool<Sqlite>, config: &ApiConfig) -> Result<()> {
    let mut tx = db.begin().await?;

    for (key, value) in [
        (KEY_API_DOMAIN, config.domain.trim()),
        (KEY_BRANCH, config.branch.trim()),
        (KEY_API_KEY, config.api_key.trim()),
    ] {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    debug!(domain = %config.domain, branch = %config.branch, "Saved API configuration");
    Ok(())
}

/// Generic setting getter
///
/// Returns `None` for a missing key or a NULL value.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(db)
            .await?;

    match value.flatten() {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}
