//! ubiqfs Core - Domain types and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `IndexedItem`, `SyncStatus`, `QueryState`
//! - **Port definitions** - Traits for adapters: `ICloudIndex`, `IIndexQuery`,
//!   `ILocalFileSystem`, `IUpdatedFilesSink`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! The domain module contains pure business logic with no platform dependencies.
//! Ports define trait interfaces that adapter crates implement; the platform
//! index adapter translates untyped platform payloads into the typed
//! notifications defined here.

pub mod config;
pub mod domain;
pub mod ports;
