//! Per-user settings and map pin styles

use crate::db::models::{require_text, PinStyle, PinStyleInput, Setting};
use crate::{ids, Error, Result};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

/// Known setting keys
pub const THEME_KEY: &str = "theme";
pub const MAP_STYLE_KEY: &str = "map_style";

pub const DEFAULT_THEME: &str = "light";
pub const DEFAULT_MAP_STYLE: &str = "street";

/// Read a setting, falling back to `default` when unset
pub async fn get_setting(pool: &SqlitePool, user: Uuid, key: &str, default: &str) -> Result<String> {
    let value: Option<String> =
        sqlx::query_scalar("SELECT value FROM user_settings WHERE key = ? AND user_id = ?")
            .bind(key)
            .bind(user.to_string())
            .fetch_optional(pool)
            .await?;

    Ok(value.unwrap_or_else(|| default.to_string()))
}

/// Insert or replace a setting
pub async fn save_setting(pool: &SqlitePool, user: Uuid, key: &str, value: &str) -> Result<()> {
    require_text("key", key)?;

    sqlx::query(
        r#"
        INSERT INTO user_settings (key, value, user_id) VALUES (?, ?, ?)
        ON CONFLICT (key, user_id) DO UPDATE SET
            value = excluded.value,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(user.to_string())
    .execute(pool)
    .await?;

    debug!(user_id = %user, key, "Saved setting");
    Ok(())
}

/// Theme and map style, with defaults filled in
pub async fn user_settings(pool: &SqlitePool, user: Uuid) -> Result<Vec<Setting>> {
    let mut settings = Vec::new();
    for (key, default) in [(THEME_KEY, DEFAULT_THEME), (MAP_STYLE_KEY, DEFAULT_MAP_STYLE)] {
        settings.push(Setting {
            key: key.to_string(),
            value: get_setting(pool, user, key, default).await?,
        });
    }
    Ok(settings)
}

// ========================================
// Pin styles
// ========================================

const PIN_STYLE_SELECT: &str = r#"
    SELECT guid AS id, name, icon_class, color, size, border_color, border_width,
           background_color, is_default
    FROM pin_styles
"#;

pub async fn list_pin_styles(pool: &SqlitePool, user: Uuid) -> Result<Vec<PinStyle>> {
    let sql = format!("{} WHERE user_id = ? ORDER BY is_default DESC, name", PIN_STYLE_SELECT);

    let styles = sqlx::query_as::<_, PinStyle>(&sql)
        .bind(user.to_string())
        .fetch_all(pool)
        .await?;

    Ok(styles)
}

pub async fn create_pin_style(pool: &SqlitePool, user: Uuid, input: &PinStyleInput) -> Result<Uuid> {
    require_text("name", &input.name)?;
    if input.size <= 0 || input.border_width < 0 {
        return Err(Error::InvalidInput(
            "Pin size must be positive and border width non-negative".to_string(),
        ));
    }

    let id = ids::generate();
    let mut tx = pool.begin().await?;

    if input.is_default {
        sqlx::query("UPDATE pin_styles SET is_default = 0 WHERE user_id = ?")
            .bind(user.to_string())
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO pin_styles (
            guid, name, icon_class, color, size, border_color, border_width,
            background_color, is_default, user_id
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(input.name.trim())
    .bind(&input.icon_class)
    .bind(&input.color)
    .bind(input.size)
    .bind(&input.border_color)
    .bind(input.border_width)
    .bind(&input.background_color)
    .bind(input.is_default)
    .bind(user.to_string())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(pin_style_id = %id, user_id = %user, "Created pin style");
    Ok(id)
}

/// Make one of the user's styles the default, clearing the others
pub async fn set_default_pin_style(pool: &SqlitePool, user: Uuid, id: Uuid) -> Result<()> {
    let mut tx = pool.begin().await?;

    let exists: Option<String> =
        sqlx::query_scalar("SELECT guid FROM pin_styles WHERE guid = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user.to_string())
            .fetch_optional(&mut *tx)
            .await?;
    if exists.is_none() {
        return Err(Error::NotFound(format!("Pin style {}", id)));
    }

    sqlx::query("UPDATE pin_styles SET is_default = (guid = ?) WHERE user_id = ?")
        .bind(id.to_string())
        .bind(user.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(pin_style_id = %id, user_id = %user, "Default pin style changed");
    Ok(())
}

pub async fn default_pin_style(pool: &SqlitePool, user: Uuid) -> Result<Option<PinStyle>> {
    let sql = format!("{} WHERE user_id = ? AND is_default = 1 LIMIT 1", PIN_STYLE_SELECT);

    let style = sqlx::query_as::<_, PinStyle>(&sql)
        .bind(user.to_string())
        .fetch_optional(pool)
        .await?;

    Ok(style)
}
