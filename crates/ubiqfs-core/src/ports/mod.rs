//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ICloudIndex`] / [`IIndexQuery`] - Platform cloud-sync index and its live queries
//! - [`ILocalFileSystem`] - Local file operations exposed to the host
//! - [`IUpdatedFilesSink`] - Receiver of freshly synced file names

pub mod change_sink;
pub mod cloud_index;
pub mod local_filesystem;

pub use change_sink::IUpdatedFilesSink;
pub use cloud_index::{
    ChangeGroup, ChangeKind, ICloudIndex, IIndexQuery, IndexNotification, IndexSignal,
    NotificationHandler, QuerySpec, RawIndexItem, ResourceFlags, SearchScope, Subscription,
};
pub use local_filesystem::{FileStat, FileType, ILocalFileSystem};
