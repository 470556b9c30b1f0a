//! Campaign repository
//!
//! Database operations for campaigns and their images.
//!
//! This module provides:
//! - `CampaignRepository` trait defining the interface for campaign data access
//! - `SqlxCampaignRepository` implementing the trait for SQLite and MySQL
//!
//! Image promotion (`insert_image` with `promote = true`) demotes the
//! campaign's current primary image and inserts the new one inside a single
//! transaction, so a reader never observes two primary images from one upload
//! and a failed insert leaves the previous primary in place.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Campaign, CampaignImage, NewCampaignImage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

use super::user::{get_user_by_id_mysql, get_user_by_id_sqlite};

/// Campaign repository trait
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    /// All campaigns, each with at most its primary image attached
    async fn list_all(&self) -> Result<Vec<Campaign>>;

    /// Campaigns owned by `user_id`, each with at most its primary image attached
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Campaign>>;

    /// Campaign with its owner and every image, ordered by image id
    async fn get_by_id(&self, id: i64) -> Result<Option<Campaign>>;

    /// Insert a new campaign and return it with its assigned id
    async fn create(&self, campaign: &Campaign) -> Result<Campaign>;

    /// Overwrite every scalar column of `campaign.id`, inserting the row if
    /// it does not exist. An id of 0 always inserts a new row.
    ///
    /// Images are not touched.
    async fn upsert(&self, campaign: &Campaign) -> Result<Campaign>;

    /// Delete a campaign and, through the foreign key, its images.
    ///
    /// Returns `false` if no row had that id.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Insert an image. With `promote`, every other image of the campaign is
    /// demoted first, in the same transaction.
    async fn insert_image(&self, image: &NewCampaignImage, promote: bool) -> Result<CampaignImage>;

    /// Clear the primary flag on every image of a campaign.
    ///
    /// Returns the number of images that were primary.
    async fn mark_all_images_non_primary(&self, campaign_id: i64) -> Result<u64>;
}

/// SQLx-based campaign repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxCampaignRepository {
    pool: DynDatabasePool,
}

impl SqlxCampaignRepository {
    /// Create a new SQLx campaign repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CampaignRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CampaignRepository for SqlxCampaignRepository {
    async fn list_all(&self) -> Result<Vec<Campaign>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_campaigns_sqlite(pool, None).await,
            Backend::Mysql(pool) => list_campaigns_mysql(pool, None).await,
        }
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Campaign>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_campaigns_sqlite(pool, Some(user_id)).await,
            Backend::Mysql(pool) => list_campaigns_mysql(pool, Some(user_id)).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Campaign>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_campaign_detail_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_campaign_detail_mysql(pool, id).await,
        }
    }

    async fn create(&self, campaign: &Campaign) -> Result<Campaign> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_campaign_sqlite(pool, campaign).await,
            Backend::Mysql(pool) => create_campaign_mysql(pool, campaign).await,
        }
    }

    async fn upsert(&self, campaign: &Campaign) -> Result<Campaign> {
        if campaign.id == 0 {
            return self.create(campaign).await;
        }
        match self.pool.backend() {
            Backend::Sqlite(pool) => upsert_campaign_sqlite(pool, campaign).await,
            Backend::Mysql(pool) => upsert_campaign_mysql(pool, campaign).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(DELETE_CAMPAIGN)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete campaign")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(DELETE_CAMPAIGN)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete campaign")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn insert_image(&self, image: &NewCampaignImage, promote: bool) -> Result<CampaignImage> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => insert_image_sqlite(pool, image, promote).await,
            Backend::Mysql(pool) => insert_image_mysql(pool, image, promote).await,
        }
    }

    async fn mark_all_images_non_primary(&self, campaign_id: i64) -> Result<u64> {
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(DEMOTE_IMAGES)
                .bind(false)
                .bind(now)
                .bind(campaign_id)
                .bind(true)
                .execute(pool)
                .await
                .context("Failed to mark campaign images non-primary")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(DEMOTE_IMAGES)
                .bind(false)
                .bind(now)
                .bind(campaign_id)
                .bind(true)
                .execute(pool)
                .await
                .context("Failed to mark campaign images non-primary")?
                .rows_affected(),
        };
        Ok(affected)
    }
}

const CAMPAIGN_COLUMNS: &str = "id, user_id, name, short_description, description, perks, \
     backer_count, goal_amount, current_amount, slug, created_at, updated_at";

const INSERT_CAMPAIGN: &str = r#"
    INSERT INTO campaigns (user_id, name, short_description, description, perks,
                           backer_count, goal_amount, current_amount, slug, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPSERT_CAMPAIGN_SQLITE: &str = r#"
    INSERT INTO campaigns (id, user_id, name, short_description, description, perks,
                           backer_count, goal_amount, current_amount, slug, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        user_id = excluded.user_id,
        name = excluded.name,
        short_description = excluded.short_description,
        description = excluded.description,
        perks = excluded.perks,
        backer_count = excluded.backer_count,
        goal_amount = excluded.goal_amount,
        current_amount = excluded.current_amount,
        slug = excluded.slug,
        updated_at = excluded.updated_at
"#;

const UPSERT_CAMPAIGN_MYSQL: &str = r#"
    INSERT INTO campaigns (id, user_id, name, short_description, description, perks,
                           backer_count, goal_amount, current_amount, slug, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON DUPLICATE KEY UPDATE
        user_id = VALUES(user_id),
        name = VALUES(name),
        short_description = VALUES(short_description),
        description = VALUES(description),
        perks = VALUES(perks),
        backer_count = VALUES(backer_count),
        goal_amount = VALUES(goal_amount),
        current_amount = VALUES(current_amount),
        slug = VALUES(slug),
        updated_at = VALUES(updated_at)
"#;

const DELETE_CAMPAIGN: &str = "DELETE FROM campaigns WHERE id = ?";

const IMAGE_COLUMNS: &str = "ci.id, ci.campaign_id, ci.file_name, ci.is_primary, ci.created_at, ci.updated_at";

const INSERT_IMAGE: &str = r#"
    INSERT INTO campaign_images (campaign_id, file_name, is_primary, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?)
"#;

const DEMOTE_IMAGES: &str = r#"
    UPDATE campaign_images
    SET is_primary = ?, updated_at = ?
    WHERE campaign_id = ? AND is_primary = ?
"#;

fn list_campaigns_sql(owner: Option<i64>) -> String {
    match owner {
        Some(_) => format!("SELECT {} FROM campaigns WHERE user_id = ? ORDER BY id", CAMPAIGN_COLUMNS),
        None => format!("SELECT {} FROM campaigns ORDER BY id", CAMPAIGN_COLUMNS),
    }
}

fn primary_images_sql(owner: Option<i64>) -> String {
    let owner_filter = if owner.is_some() { " AND c.user_id = ?" } else { "" };
    format!(
        "SELECT {} FROM campaign_images ci JOIN campaigns c ON c.id = ci.campaign_id \
         WHERE ci.is_primary = ?{} ORDER BY ci.id",
        IMAGE_COLUMNS, owner_filter
    )
}

fn all_images_sql() -> String {
    format!(
        "SELECT {} FROM campaign_images ci WHERE ci.campaign_id = ? ORDER BY ci.id",
        IMAGE_COLUMNS
    )
}

/// Attach at most one primary image to each campaign.
///
/// `images` must be ordered by id; when a campaign has several primary rows
/// the last one (highest id) is kept.
fn attach_primary_images(campaigns: &mut [Campaign], images: Vec<CampaignImage>) {
    let mut by_campaign: HashMap<i64, CampaignImage> = HashMap::new();
    for image in images.into_iter().filter(|image| image.is_primary) {
        by_campaign.insert(image.campaign_id, image);
    }

    for campaign in campaigns.iter_mut() {
        campaign.images = by_campaign.remove(&campaign.id).into_iter().collect();
    }
}

fn new_image_record(
    id: i64,
    image: &NewCampaignImage,
    is_primary: bool,
    now: DateTime<Utc>,
) -> CampaignImage {
    CampaignImage {
        id,
        campaign_id: image.campaign_id,
        file_name: image.file_name.clone(),
        is_primary,
        created_at: now,
        updated_at: now,
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_campaigns_sqlite(pool: &SqlitePool, owner: Option<i64>) -> Result<Vec<Campaign>> {
    let campaign_sql = list_campaigns_sql(owner);
    let mut query = sqlx::query(&campaign_sql);
    if let Some(user_id) = owner {
        query = query.bind(user_id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list campaigns")?;
    let mut campaigns = rows.iter().map(row_to_campaign_sqlite).collect::<Vec<_>>();

    let image_sql = primary_images_sql(owner);
    let mut query = sqlx::query(&image_sql).bind(true);
    if let Some(user_id) = owner {
        query = query.bind(user_id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list primary campaign images")?;
    let images = rows.iter().map(row_to_image_sqlite).collect();

    attach_primary_images(&mut campaigns, images);
    Ok(campaigns)
}

async fn get_campaign_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Campaign>> {
    let row = sqlx::query(&format!("SELECT {} FROM campaigns WHERE id = ?", CAMPAIGN_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get campaign by ID")?;

    Ok(row.as_ref().map(row_to_campaign_sqlite))
}

async fn get_campaign_detail_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Campaign>> {
    let Some(mut campaign) = get_campaign_sqlite(pool, id).await? else {
        return Ok(None);
    };

    let rows = sqlx::query(&all_images_sql())
        .bind(id)
        .fetch_all(pool)
        .await
        .context("Failed to get campaign images")?;
    campaign.images = rows.iter().map(row_to_image_sqlite).collect();
    campaign.user = get_user_by_id_sqlite(pool, campaign.user_id).await?;

    Ok(Some(campaign))
}

async fn create_campaign_sqlite(pool: &SqlitePool, campaign: &Campaign) -> Result<Campaign> {
    let now = Utc::now();

    let result = sqlx::query(INSERT_CAMPAIGN)
        .bind(campaign.user_id)
        .bind(&campaign.name)
        .bind(&campaign.short_description)
        .bind(&campaign.description)
        .bind(&campaign.perks)
        .bind(campaign.backer_count)
        .bind(campaign.goal_amount)
        .bind(campaign.current_amount)
        .bind(&campaign.slug)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create campaign")?;

    Ok(Campaign {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        images: Vec::new(),
        user: None,
        ..campaign.clone()
    })
}

async fn upsert_campaign_sqlite(pool: &SqlitePool, campaign: &Campaign) -> Result<Campaign> {
    sqlx::query(UPSERT_CAMPAIGN_SQLITE)
        .bind(campaign.id)
        .bind(campaign.user_id)
        .bind(&campaign.name)
        .bind(&campaign.short_description)
        .bind(&campaign.description)
        .bind(&campaign.perks)
        .bind(campaign.backer_count)
        .bind(campaign.goal_amount)
        .bind(campaign.current_amount)
        .bind(&campaign.slug)
        .bind(campaign.created_at)
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to save campaign")?;

    get_campaign_sqlite(pool, campaign.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Campaign {} not found after save", campaign.id))
}

async fn insert_image_sqlite(
    pool: &SqlitePool,
    image: &NewCampaignImage,
    promote: bool,
) -> Result<CampaignImage> {
    let now = Utc::now();
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin image upload transaction")?;

    if promote {
        sqlx::query(DEMOTE_IMAGES)
            .bind(false)
            .bind(now)
            .bind(image.campaign_id)
            .bind(true)
            .execute(&mut *tx)
            .await
            .context("Failed to demote campaign images")?;
    }

    let result = sqlx::query(INSERT_IMAGE)
        .bind(image.campaign_id)
        .bind(&image.file_name)
        .bind(promote)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to insert campaign image")?;

    tx.commit()
        .await
        .context("Failed to commit image upload transaction")?;

    Ok(new_image_record(result.last_insert_rowid(), image, promote, now))
}

fn row_to_campaign_sqlite(row: &sqlx::sqlite::SqliteRow) -> Campaign {
    Campaign {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        short_description: row.get("short_description"),
        description: row.get("description"),
        perks: row.get("perks"),
        backer_count: row.get("backer_count"),
        goal_amount: row.get("goal_amount"),
        current_amount: row.get("current_amount"),
        slug: row.get("slug"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        images: Vec::new(),
        user: None,
    }
}

fn row_to_image_sqlite(row: &sqlx::sqlite::SqliteRow) -> CampaignImage {
    CampaignImage {
        id: row.get("id"),
        campaign_id: row.get("campaign_id"),
        file_name: row.get("file_name"),
        is_primary: row.get("is_primary"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_campaigns_mysql(pool: &MySqlPool, owner: Option<i64>) -> Result<Vec<Campaign>> {
    let campaign_sql = list_campaigns_sql(owner);
    let mut query = sqlx::query(&campaign_sql);
    if let Some(user_id) = owner {
        query = query.bind(user_id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list campaigns")?;
    let mut campaigns = rows.iter().map(row_to_campaign_mysql).collect::<Vec<_>>();

    let image_sql = primary_images_sql(owner);
    let mut query = sqlx::query(&image_sql).bind(true);
    if let Some(user_id) = owner {
        query = query.bind(user_id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list primary campaign images")?;
    let images = rows.iter().map(row_to_image_mysql).collect();

    attach_primary_images(&mut campaigns, images);
    Ok(campaigns)
}

async fn get_campaign_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Campaign>> {
    let row = sqlx::query(&format!("SELECT {} FROM campaigns WHERE id = ?", CAMPAIGN_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get campaign by ID")?;

    Ok(row.as_ref().map(row_to_campaign_mysql))
}

async fn get_campaign_detail_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Campaign>> {
    let Some(mut campaign) = get_campaign_mysql(pool, id).await? else {
        return Ok(None);
    };

    let rows = sqlx::query(&all_images_sql())
        .bind(id)
        .fetch_all(pool)
        .await
        .context("Failed to get campaign images")?;
    campaign.images = rows.iter().map(row_to_image_mysql).collect();
    campaign.user = get_user_by_id_mysql(pool, campaign.user_id).await?;

    Ok(Some(campaign))
}

async fn create_campaign_mysql(pool: &MySqlPool, campaign: &Campaign) -> Result<Campaign> {
    let now = Utc::now();

    let result = sqlx::query(INSERT_CAMPAIGN)
        .bind(campaign.user_id)
        .bind(&campaign.name)
        .bind(&campaign.short_description)
        .bind(&campaign.description)
        .bind(&campaign.perks)
        .bind(campaign.backer_count)
        .bind(campaign.goal_amount)
        .bind(campaign.current_amount)
        .bind(&campaign.slug)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create campaign")?;

    Ok(Campaign {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        images: Vec::new(),
        user: None,
        ..campaign.clone()
    })
}

async fn upsert_campaign_mysql(pool: &MySqlPool, campaign: &Campaign) -> Result<Campaign> {
    sqlx::query(UPSERT_CAMPAIGN_MYSQL)
        .bind(campaign.id)
        .bind(campaign.user_id)
        .bind(&campaign.name)
        .bind(&campaign.short_description)
        .bind(&campaign.description)
        .bind(&campaign.perks)
        .bind(campaign.backer_count)
        .bind(campaign.goal_amount)
        .bind(campaign.current_amount)
        .bind(&campaign.slug)
        .bind(campaign.created_at)
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to save campaign")?;

    get_campaign_mysql(pool, campaign.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Campaign {} not found after save", campaign.id))
}

async fn insert_image_mysql(
    pool: &MySqlPool,
    image: &NewCampaignImage,
    promote: bool,
) -> Result<CampaignImage> {
    let now = Utc::now();
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin image upload transaction")?;

    if promote {
        sqlx::query(DEMOTE_IMAGES)
            .bind(false)
            .bind(now)
            .bind(image.campaign_id)
            .bind(true)
            .execute(&mut *tx)
            .await
            .context("Failed to demote campaign images")?;
    }

    let result = sqlx::query(INSERT_IMAGE)
        .bind(image.campaign_id)
        .bind(&image.file_name)
        .bind(promote)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to insert campaign image")?;

    tx.commit()
        .await
        .context("Failed to commit image upload transaction")?;

    Ok(new_image_record(result.last_insert_id() as i64, image, promote, now))
}

fn row_to_campaign_mysql(row: &sqlx::mysql::MySqlRow) -> Campaign {
    Campaign {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        short_description: row.get("short_description"),
        description: row.get("description"),
        perks: row.get("perks"),
        backer_count: row.get("backer_count"),
        goal_amount: row.get("goal_amount"),
        current_amount: row.get("current_amount"),
        slug: row.get("slug"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        images: Vec::new(),
        user: None,
    }
}

fn row_to_image_mysql(row: &sqlx::mysql::MySqlRow) -> CampaignImage {
    CampaignImage {
        id: row.get("id"),
        campaign_id: row.get("campaign_id"),
        file_name: row.get("file_name"),
        is_primary: row.get("is_primary"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
