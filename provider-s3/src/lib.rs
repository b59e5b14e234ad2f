//! # S3 Provider
//!
//! [`ObjectStore`](bridge_traits::object_store::ObjectStore) backed by the
//! AWS SDK. Used for the snapshot, backup and artist-id buckets.

pub mod error;
pub mod store;

pub use error::{Result, S3Error};
pub use store::S3ObjectStore;
