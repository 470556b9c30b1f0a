//! Campaign gallery service
//!
//! Campaign CRUD plus the primary-image protocol:
//! - a campaign owns zero or more images, at most one flagged primary
//! - uploading with `mark_as_primary` demotes every other image of the
//!   campaign and inserts the new one in a single transaction
//! - uploading without it never touches existing images
//!
//! List views attach only the primary image; the detail view attaches the
//! owner and every image.

use crate::db::repositories::{is_foreign_key_violation, CampaignRepository};
use crate::models::{Campaign, CampaignImage, NewCampaign, NewCampaignImage};
use std::sync::Arc;

/// Error types for gallery operations
#[derive(Debug, thiserror::Error)]
pub enum GalleryError {
    /// No campaign with this id
    #[error("Campaign not found: {0}")]
    NotFound(i64),

    /// The record store failed
    #[error("Store failure: {0}")]
    StoreFailure(#[from] anyhow::Error),
}

/// Campaign gallery service
pub struct CampaignGallery {
    campaign_repo: Arc<dyn CampaignRepository>,
}

impl CampaignGallery {
    /// Create a new gallery over the given repository
    pub fn new(campaign_repo: Arc<dyn CampaignRepository>) -> Self {
        Self { campaign_repo }
    }

    /// List every campaign with its primary image, if it has one
    pub async fn list_all(&self) -> Result<Vec<Campaign>, GalleryError> {
        Ok(self.campaign_repo.list_all().await?)
    }

    /// List the campaigns of one owner with their primary images
    pub async fn list_by_owner(&self, user_id: i64) -> Result<Vec<Campaign>, GalleryError> {
        Ok(self.campaign_repo.list_by_user(user_id).await?)
    }

    /// Get a campaign with its owner and all of its images
    pub async fn get_detail(&self, id: i64) -> Result<Campaign, GalleryError> {
        self.campaign_repo
            .get_by_id(id)
            .await?
            .ok_or(GalleryError::NotFound(id))
    }

    /// Create a campaign.
    ///
    /// The slug is derived from the name and the owner id.
    pub async fn create(&self, input: NewCampaign) -> Result<Campaign, GalleryError> {
        let slug = generate_slug(&input.name, input.user_id);
        let campaign = self
            .campaign_repo
            .create(&Campaign::new(input, slug))
            .await?;

        tracing::debug!("Created campaign {} for user {}", campaign.id, campaign.user_id);
        Ok(campaign)
    }

    /// Save every scalar field of `campaign`, inserting it if its id is unknown.
    ///
    /// Images are left as they are.
    pub async fn update(&self, campaign: Campaign) -> Result<Campaign, GalleryError> {
        let saved = self.campaign_repo.upsert(&campaign).await?;

        tracing::debug!("Saved campaign {}", saved.id);
        Ok(saved)
    }

    /// Attach an image to a campaign.
    ///
    /// With `mark_as_primary` the new image becomes the campaign's only
    /// primary image. If the insert fails the previous primary stays.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the campaign does not exist
    /// - `StoreFailure` for any other database error
    pub async fn upload_image(
        &self,
        input: NewCampaignImage,
        mark_as_primary: bool,
    ) -> Result<CampaignImage, GalleryError> {
        let image = self
            .campaign_repo
            .insert_image(&input, mark_as_primary)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    GalleryError::NotFound(input.campaign_id)
                } else {
                    GalleryError::StoreFailure(e)
                }
            })?;

        tracing::debug!(
            "Uploaded image {} to campaign {} (primary: {})",
            image.id,
            image.campaign_id,
            image.is_primary
        );
        Ok(image)
    }

    /// Clear the primary flag on every image of a campaign.
    ///
    /// Returns how many images were primary. Zero is not an error, including
    /// for an unknown campaign.
    pub async fn mark_all_non_primary(&self, campaign_id: i64) -> Result<u64, GalleryError> {
        let demoted = self
            .campaign_repo
            .mark_all_images_non_primary(campaign_id)
            .await?;

        tracing::debug!("Demoted {} images of campaign {}", demoted, campaign_id);
        Ok(demoted)
    }

    /// Delete a campaign together with its images
    pub async fn delete(&self, id: i64) -> Result<(), GalleryError> {
        if !self.campaign_repo.delete(id).await? {
            return Err(GalleryError::NotFound(id));
        }

        tracing::debug!("Deleted campaign {}", id);
        Ok(())
    }
}

/// Generate a campaign slug from its name and owner id.
///
/// Lowercase ASCII alphanumeric runs joined by single hyphens; everything
/// else separates.
pub fn generate_slug(name: &str, user_id: i64) -> String {
    format!("{} {}", name, user_id)
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, DatabaseDriver};
    use crate::db::repositories::{SqlxCampaignRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_pool, create_test_pool, migrations, DynDatabasePool};
    use crate::models::{User, UserRole};

    async fn setup_test_gallery() -> (CampaignGallery, User) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        setup_gallery_on(pool).await
    }

    async fn setup_gallery_on(pool: DynDatabasePool) -> (CampaignGallery, User) {
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let owner = SqlxUserRepository::new(pool.clone())
            .create(&User::new(
                "Owner".to_string(),
                "owner@example.com".to_string(),
                "Potter".to_string(),
                "hash".to_string(),
                UserRole::User,
            ))
            .await
            .expect("Failed to create owner");

        (CampaignGallery::new(SqlxCampaignRepository::boxed(pool)), owner)
    }

    fn new_campaign(user_id: i64, name: &str) -> NewCampaign {
        NewCampaign {
            user_id,
            name: name.to_string(),
            short_description: "A short pitch".to_string(),
            description: "The long story".to_string(),
            perks: "sticker, mug".to_string(),
            goal_amount: 5_000,
        }
    }

    fn primary_ids(campaign: &Campaign) -> Vec<i64> {
        campaign
            .images
            .iter()
            .filter(|image| image.is_primary)
            .map(|image| image.id)
            .collect()
    }

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("Hello World", 7), "hello-world-7");
        assert_eq!(generate_slug("  Solar -- Kiln!! ", 12), "solar-kiln-12");
        assert_eq!(generate_slug("Café Ölsen", 3), "caf-lsen-3");
        assert_eq!(generate_slug("", 1), "1");
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_slug() {
        let (gallery, owner) = setup_test_gallery().await;

        let campaign = gallery
            .create(new_campaign(owner.id, "Solar Kiln"))
            .await
            .expect("Failed to create campaign");

        assert!(campaign.id > 0);
        assert_eq!(campaign.slug, format!("solar-kiln-{}", owner.id));
        assert_eq!(campaign.backer_count, 0);
        assert_eq!(campaign.current_amount, 0);
    }

    #[tokio::test]
    async fn test_promoting_twice_keeps_latest_primary() {
        let (gallery, owner) = setup_test_gallery().await;
        let campaign = gallery.create(new_campaign(owner.id, "Kiln")).await.unwrap();

        let first = gallery
            .upload_image(NewCampaignImage::new(campaign.id, "images/1.png"), true)
            .await
            .expect("Failed to upload first image");
        let second = gallery
            .upload_image(NewCampaignImage::new(campaign.id, "images/2.png"), true)
            .await
            .expect("Failed to upload second image");

        let detail = gallery.get_detail(campaign.id).await.unwrap();
        assert_eq!(detail.images.len(), 2);
        assert_eq!(detail.images[0].id, first.id);
        assert!(!detail.images[0].is_primary);
        assert_eq!(primary_ids(&detail), vec![second.id]);
        assert_eq!(detail.user.as_ref().map(|u| u.id), Some(owner.id));

        let listed = gallery.list_all().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].images.len(), 1);
        assert_eq!(listed[0].images[0].file_name, "images/2.png");
        assert_eq!(listed[0].primary_image().map(|i| i.id), Some(second.id));
    }

    #[tokio::test]
    async fn test_non_primary_upload_leaves_primary() {
        let (gallery, owner) = setup_test_gallery().await;
        let campaign = gallery.create(new_campaign(owner.id, "Kiln")).await.unwrap();

        let primary = gallery
            .upload_image(NewCampaignImage::new(campaign.id, "images/cover.png"), true)
            .await
            .unwrap();
        let extra = gallery
            .upload_image(NewCampaignImage::new(campaign.id, "images/extra.png"), false)
            .await
            .unwrap();
        assert!(!extra.is_primary);

        let detail = gallery.get_detail(campaign.id).await.unwrap();
        assert_eq!(primary_ids(&detail), vec![primary.id]);
    }

    #[tokio::test]
    async fn test_list_without_primary_attaches_nothing() {
        let (gallery, owner) = setup_test_gallery().await;
        let campaign = gallery.create(new_campaign(owner.id, "Kiln")).await.unwrap();
        gallery
            .upload_image(NewCampaignImage::new(campaign.id, "images/a.png"), false)
            .await
            .unwrap();

        let listed = gallery.list_by_owner(owner.id).await.unwrap();

        assert_eq!(listed.len(), 1);
        assert!(listed[0].images.is_empty());
    }

    #[tokio::test]
    async fn test_upload_to_missing_campaign() {
        let (gallery, _owner) = setup_test_gallery().await;

        let result = gallery
            .upload_image(NewCampaignImage::new(9_999, "images/x.png"), true)
            .await;

        assert!(matches!(result, Err(GalleryError::NotFound(9_999))));
    }

    #[tokio::test]
    async fn test_get_detail_not_found() {
        let (gallery, _owner) = setup_test_gallery().await;

        assert!(matches!(
            gallery.get_detail(42).await,
            Err(GalleryError::NotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_update_does_not_touch_images() {
        let (gallery, owner) = setup_test_gallery().await;
        let campaign = gallery.create(new_campaign(owner.id, "Kiln")).await.unwrap();
        let image = gallery
            .upload_image(NewCampaignImage::new(campaign.id, "images/a.png"), true)
            .await
            .unwrap();

        let mut changed = gallery.get_detail(campaign.id).await.unwrap();
        changed.name = "Kiln Mk II".to_string();
        changed.backer_count = 3;
        changed.images.clear();
        let saved = gallery.update(changed).await.expect("Failed to update");
        assert_eq!(saved.name, "Kiln Mk II");
        assert_eq!(saved.backer_count, 3);

        let detail = gallery.get_detail(campaign.id).await.unwrap();
        assert_eq!(primary_ids(&detail), vec![image.id]);
    }

    #[tokio::test]
    async fn test_mark_all_non_primary() {
        let (gallery, owner) = setup_test_gallery().await;
        let campaign = gallery.create(new_campaign(owner.id, "Kiln")).await.unwrap();
        gallery
            .upload_image(NewCampaignImage::new(campaign.id, "images/a.png"), true)
            .await
            .unwrap();

        assert_eq!(gallery.mark_all_non_primary(campaign.id).await.unwrap(), 1);
        assert_eq!(gallery.mark_all_non_primary(campaign.id).await.unwrap(), 0);
        assert_eq!(gallery.mark_all_non_primary(31_337).await.unwrap(), 0);

        let detail = gallery.get_detail(campaign.id).await.unwrap();
        assert!(detail.primary_image().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_promotions_leave_one_primary() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let pool = create_pool(&DatabaseConfig {
            driver: DatabaseDriver::Sqlite,
            url: temp_dir.path().join("gallery.db").to_string_lossy().to_string(),
        })
        .await
        .expect("Failed to create pool");
        let (gallery, owner) = setup_gallery_on(pool).await;
        let gallery = Arc::new(gallery);
        let campaign_id = gallery.create(new_campaign(owner.id, "Kiln")).await.unwrap().id;

        let uploads: Vec<_> = (0..16)
            .map(|i| {
                let gallery = Arc::clone(&gallery);
                tokio::spawn(async move {
                    gallery
                        .upload_image(
                            NewCampaignImage::new(campaign_id, format!("images/{}.png", i)),
                            true,
                        )
                        .await
                })
            })
            .collect();
        for upload in uploads {
            upload
                .await
                .expect("Upload task panicked")
                .expect("Concurrent upload failed");
        }

        let detail = gallery.get_detail(campaign_id).await.unwrap();
        assert_eq!(detail.images.len(), 16);
        let newest = detail.images.iter().map(|image| image.id).max();
        assert_eq!(primary_ids(&detail), newest.into_iter().collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_delete_campaign() {
        let (gallery, owner) = setup_test_gallery().await;
        let campaign = gallery.create(new_campaign(owner.id, "Kiln")).await.unwrap();

        gallery.delete(campaign.id).await.expect("Failed to delete");

        assert!(matches!(
            gallery.delete(campaign.id).await,
            Err(GalleryError::NotFound(_))
        ));
        assert!(gallery.list_all().await.unwrap().is_empty());
    }
}
