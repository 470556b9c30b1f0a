//! Crowdfund - Core of a crowdfunding backend
//!
//! This library provides campaign galleries with a primary-image protocol and
//! the credential lifecycle of user accounts, persisted in SQLite or MySQL.

pub mod config;
pub mod db;
pub mod models;
pub mod services;
