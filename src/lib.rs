//! zcrm-auth: Zoho CRM OAuth2 token lifecycle for Rust.
//!
//! Exchanges an authorization code for an access/refresh token pair, keeps
//! the access token fresh on a timer or after a 401, optionally caches the
//! pair on disk, and decodes CRM records into typed structs plus property
//! bags.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use zcrm_auth::api::CrmClient;
//! use zcrm_auth::auth::StorageOption;
//! use zcrm_auth::config::ZcrmConfig;
//!
//! # async fn example() -> zcrm_auth::error::Result<()> {
//! let config = ZcrmConfig::from_env()?;
//! let manager = Arc::new(config.token_manager()?);
//! manager.begin_flow(StorageOption::InMemory).await?;
//!
//! let records = CrmClient::new(manager)
//!     .with_base_url(config.api_base_url())
//!     .get_records("Purchase_Orders")
//!     .await?;
//! println!("{} records", records.len());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod records;

#[cfg(feature = "cli")]
pub mod cli;
