//! ubiqfs Sync - Cloud container observation and local file operations
//!
//! Provides:
//! - A live observer over the platform cloud-sync index
//! - Classification of freshly synced files and opportunistic downloads
//! - The host-facing filesystem facade
//! - Bulk local↔cloud migration
//!
//! ## Modules
//!
//! - [`observer`] - `SyncIndexObserver`: owns the index query and its task
//! - [`reconciler`] - `SyncReconciler`: freshly-synced classification, download sweep
//! - [`facade`] - `Filesystem`: `observe_dir`, updated-files sink, bulk moves
//! - [`migration`] - Tree copy + source sweep used by bulk moves
//! - [`filesystem`] - Local filesystem adapter (`tokio::fs`)
//! - [`logging`] - `tracing` subscriber setup for hosts

pub mod facade;
pub mod filesystem;
pub mod logging;
pub mod migration;
pub mod observer;
pub mod reconciler;

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during observation and file operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// No cloud account is signed in on this device
    #[error("No cloud account is signed in")]
    NotSignedIn,

    /// Writing without `recursive` into a missing directory
    #[error("Parent folder doesn't exist: {0}")]
    NoParentFolder(PathBuf),

    /// Non-recursive removal of a directory with contents
    #[error("Folder is not empty: {0}")]
    NotEmpty(PathBuf),

    /// The specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// A domain-level error propagated from ubiqfs-core
    #[error("Domain error: {0}")]
    DomainError(#[from] ubiqfs_core::domain::errors::DomainError),
}
