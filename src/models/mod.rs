//! Data models
//!
//! This module contains the data structures shared by the persistence layer
//! and the services:
//! - Database entities (User, Campaign, CampaignImage)
//! - Input types for creating records

mod campaign;
mod user;

pub use campaign::{Campaign, CampaignImage, NewCampaign, NewCampaignImage};
pub use user::{User, UserRole};
