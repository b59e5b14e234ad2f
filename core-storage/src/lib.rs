//! # Core Storage
//!
//! Moves pipeline artifacts between the local data directory and a
//! bucket-addressed object store. See [`ObjectStoreGateway`] for the transfer
//! strategies.

pub mod error;
pub mod gateway;
pub mod memory;

pub use error::{Result, StorageError};
pub use gateway::{
    local_name_for_key, ObjectStoreGateway, PartProgress, TransferReport, TransferStrategy,
    MAX_DELETE_BATCH,
};
pub use memory::MemoryObjectStore;
