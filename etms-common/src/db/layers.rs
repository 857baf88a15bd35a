//! Map layer repository
//!
//! Layers are shared across tenants. Only head users create or edit them;
//! app users read the active set.

use crate::db::models::{require_text, LayerInput, LayerType, MapLayer};
use crate::{ids, Error, Result};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;
use uuid::Uuid;

const LAYER_SELECT: &str = r#"
    SELECT guid AS id, name, description, url, layer_type, is_active, is_default,
           attribution, z_index
    FROM map_layers
"#;

fn validate_layer(input: &LayerInput) -> Result<()> {
    require_text("name", &input.name)?;
    require_text("url", &input.url)?;
    Ok(())
}

/// List layers by z-index; `active_only` hides deactivated ones
pub async fn list_layers(pool: &SqlitePool, active_only: bool) -> Result<Vec<MapLayer>> {
    let sql = format!(
        "{} WHERE (? = 0 OR is_active = 1) ORDER BY z_index, name",
        LAYER_SELECT
    );

    let layers = sqlx::query_as::<_, MapLayer>(&sql)
        .bind(active_only)
        .fetch_all(pool)
        .await?;

    Ok(layers)
}

pub async fn get_layer(pool: &SqlitePool, id: Uuid) -> Result<MapLayer> {
    let sql = format!("{} WHERE guid = ?", LAYER_SELECT);

    sqlx::query_as::<_, MapLayer>(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Map layer {}", id)))
}

/// At most one default layer per layer type
async fn clear_default_for_type(
    tx: &mut Transaction<'_, Sqlite>,
    layer_type: LayerType,
    except: &str,
) -> Result<()> {
    sqlx::query("UPDATE map_layers SET is_default = 0 WHERE layer_type = ? AND guid != ?")
        .bind(layer_type.as_str())
        .bind(except)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

pub async fn create_layer(pool: &SqlitePool, input: &LayerInput, creator: Uuid) -> Result<Uuid> {
    validate_layer(input)?;

    let id = ids::generate();
    let mut tx = pool.begin().await?;

    if input.is_default {
        clear_default_for_type(&mut tx, input.layer_type, &id.to_string()).await?;
    }

    sqlx::query(
        r#"
        INSERT INTO map_layers (
            guid, name, description, url, layer_type, is_active, is_default,
            attribution, z_index, user_id
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(input.name.trim())
    .bind(&input.description)
    .bind(input.url.trim())
    .bind(input.layer_type.as_str())
    .bind(input.is_active)
    .bind(input.is_default)
    .bind(&input.attribution)
    .bind(input.z_index)
    .bind(creator.to_string())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(layer_id = %id, name = %input.name, layer_type = input.layer_type.as_str(), "Created map layer");
    Ok(id)
}

pub async fn update_layer(pool: &SqlitePool, id: Uuid, input: &LayerInput) -> Result<()> {
    validate_layer(input)?;

    let mut tx = pool.begin().await?;

    if input.is_default {
        clear_default_for_type(&mut tx, input.layer_type, &id.to_string()).await?;
    }

    let result = sqlx::query(
        r#"
        UPDATE map_layers SET
            name = ?, description = ?, url = ?, layer_type = ?, is_active = ?,
            is_default = ?, attribution = ?, z_index = ?
        WHERE guid = ?
        "#,
    )
    .bind(input.name.trim())
    .bind(&input.description)
    .bind(input.url.trim())
    .bind(input.layer_type.as_str())
    .bind(input.is_active)
    .bind(input.is_default)
    .bind(&input.attribution)
    .bind(input.z_index)
    .bind(id.to_string())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Map layer {}", id)));
    }

    tx.commit().await?;

    info!(layer_id = %id, "Updated map layer");
    Ok(())
}

pub async fn delete_layer(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM map_layers WHERE guid = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Map layer {}", id)));
    }

    info!(layer_id = %id, "Deleted map layer");
    Ok(())
}
