// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistence for pages, rendered artifacts, files, users and sessions in a
//! remote object store, with a bounded in-memory layer per record type.
//!
//! ## Layers
//!
//! ```text
//! CacheStack::load/save/delete::<T>     (stack.rs, typed dispatch)
//!   -> CacheLayer<T>                    (cache.rs, LRU, write-through)
//!     -> Encode / Decode                (codec.rs + records/)
//!       -> BareStore                    (bare.rs, deadlines, logging)
//!         -> dyn ObjectStore            (object_store.rs)
//!              MemoryObjectStore        (memory.rs)
//!              FsObjectStore            (fs_store.rs)
//! ```
//!
//! ## Bucket Layout
//!
//! See [`paths`]. The layout is shared with existing buckets.
//!
//! ## Consistency
//!
//! - Mutations reach the store before memory is touched
//! - A store failure or timeout is never reported as `NotFound`
//! - Same-key operations are serialized; different keys run concurrently

pub mod bare;
pub mod cache;
pub mod codec;
pub mod error;
pub mod fs_store;
pub mod lock;
pub mod memory;
pub mod object_store;
pub mod paths;
pub mod records;
pub mod stack;

pub use bare::{BareObject, BareStore, DEFAULT_MAX_KEYS, DEFAULT_STORE_TIMEOUT};
pub use cache::{CacheLayer, CacheStats};
pub use codec::{Decode, Encode, RecordKind, SchemaError};
pub use error::{StorageError, StorageResult};
pub use fs_store::FsObjectStore;
pub use memory::{MemoryObjectStore, StoreOp};
pub use object_store::{Acl, Listing, ObjectStore, ObjectVersion, PutReceipt};
pub use paths::ObjectKeys;
pub use records::{
    title_hash, Breadcrumb, FileKey, FileRecord, PageKey, PageRecord, RenderedArtifact,
    SessionRecord, UserRecord,
};
pub use stack::{CacheCapacities, CacheStack, Layered};
