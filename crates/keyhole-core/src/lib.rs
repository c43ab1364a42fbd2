//! Core types and traits for the Keyhole URL shortener.
//!
//! This crate provides the short-code codec and the storage and cache
//! contracts shared by the resolver, the storage backends and the
//! cache backends.

pub mod cache;
pub mod codec;
pub mod error;
pub mod owner;
pub mod repository;
pub mod shortcode;

pub use cache::{LeaseLock, LeaseToken, UrlCache};
pub use codec::IdOffset;
pub use error::{CacheError, CodecError, CoreError, StorageError};
pub use owner::OwnerId;
pub use repository::{BulkShortCode, InsertAttempt, UrlRecord, UrlRepository};
pub use shortcode::ShortCode;
