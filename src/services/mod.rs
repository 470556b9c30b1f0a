//! Services layer - Business logic
//!
//! Services hold repository handles and enforce the rules the store alone
//! cannot express:
//! - the single-primary-image rule of campaign galleries
//! - password hashing and credential checks

pub mod gallery;
pub mod identity;
pub mod password;

pub use gallery::{generate_slug, CampaignGallery, GalleryError};
pub use identity::{IdentityError, IdentityService, LoginInput, RegisterInput};
pub use password::{CredentialHasher, PasswordError};
