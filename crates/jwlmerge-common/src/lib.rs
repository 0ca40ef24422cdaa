//! Jwlmerge-Common: Shared types and utilities.
//!
//! This crate provides common functionality used across jwlmerge:
//!
//! - **Error Handling**: The unified error type and result alias
//! - **Configuration**: The explicit merge configuration record
//! - **Manifest Model**: Serde model of a backup archive's `manifest.json`
//!
//! # Examples
//!
//! ```
//! use jwlmerge_common::{Error, MergeConfig, Result};
//!
//! let config = MergeConfig::default();
//! assert_eq!(config.app_name, "jwlmerge");
//!
//! fn example() -> Result<()> {
//!     Err(Error::input_missing("no archives supplied"))
//! }
//! ```

pub mod config;
pub mod error;
pub mod manifest;

pub use config::MergeConfig;
pub use error::{Error, Result};
pub use manifest::{Manifest, UserDataBackup};
