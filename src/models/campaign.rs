//! Campaign model
//!
//! This module provides:
//! - `Campaign` entity representing a fundraising campaign
//! - `CampaignImage` entity for the campaign's image gallery
//! - Input types for creating campaigns and uploading images
//!
//! A campaign exclusively owns its images. At most one image of a campaign
//! carries `is_primary = true`; the gallery service maintains that rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::User;

/// Campaign entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    /// Unique identifier
    pub id: i64,
    /// Owner user ID
    pub user_id: i64,
    /// Campaign name
    pub name: String,
    /// One-line summary
    pub short_description: String,
    /// Full description
    pub description: String,
    /// Comma separated list of backer perks
    pub perks: String,
    /// Number of backers so far
    #[serde(default)]
    pub backer_count: i64,
    /// Funding goal
    pub goal_amount: i64,
    /// Amount raised so far
    #[serde(default)]
    pub current_amount: i64,
    /// URL-friendly slug
    pub slug: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Attached images.
    ///
    /// List queries attach only the primary image; detail queries attach all
    /// images ordered by id.
    #[serde(default)]
    pub images: Vec<CampaignImage>,
    /// Owning user, populated by detail queries only
    #[serde(default)]
    pub user: Option<User>,
}

impl Campaign {
    /// Build an unsaved campaign from creation input and a slug
    pub fn new(input: NewCampaign, slug: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by database
            user_id: input.user_id,
            name: input.name,
            short_description: input.short_description,
            description: input.description,
            perks: input.perks,
            backer_count: 0,
            goal_amount: input.goal_amount,
            current_amount: 0,
            slug,
            created_at: now,
            updated_at: now,
            images: Vec::new(),
            user: None,
        }
    }

    /// The image currently flagged as primary, if any
    pub fn primary_image(&self) -> Option<&CampaignImage> {
        self.images.iter().find(|image| image.is_primary)
    }

    /// Perks split into trimmed, non-empty entries
    pub fn perk_list(&self) -> Vec<&str> {
        self.perks
            .split(',')
            .map(str::trim)
            .filter(|perk| !perk.is_empty())
            .collect()
    }
}

/// Image attached to a campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignImage {
    /// Unique identifier
    pub id: i64,
    /// Owning campaign ID
    pub campaign_id: i64,
    /// Storage location produced by the upload layer
    pub file_name: String,
    /// Whether this is the campaign's representative image
    pub is_primary: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a campaign
#[derive(Debug, Clone)]
pub struct NewCampaign {
    /// Owner user ID
    pub user_id: i64,
    /// Campaign name
    pub name: String,
    /// One-line summary
    pub short_description: String,
    /// Full description
    pub description: String,
    /// Comma separated list of perks
    pub perks: String,
    /// Funding goal
    pub goal_amount: i64,
}

/// Input for uploading an image to a campaign
#[derive(Debug, Clone)]
pub struct NewCampaignImage {
    /// Target campaign ID
    pub campaign_id: i64,
    /// Storage location produced by the upload layer
    pub file_name: String,
}

impl NewCampaignImage {
    pub fn new(campaign_id: i64, file_name: impl Into<String>) -> Self {
        Self {
            campaign_id,
            file_name: file_name.into(),
        }
    }
}
