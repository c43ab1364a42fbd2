//! Short-code creation and resolution.
//!
//! [`ResolutionService`] is the entry point for everything outside the
//! storage and cache layers. Creation goes straight to the store's
//! find-or-create. Resolution is cache-aside: on a miss one task per code
//! wins a lease, reads the store and fills the cache, while the others poll
//! the cache until the winner is done.
//!
//! # Example
//!
//! ```rust
//! use keyhole_cache::MokaUrlCache;
//! use keyhole_resolver::{ResolutionService, Resolver, ResolverSettings};
//! use keyhole_storage::InMemoryUrlRepository;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = ResolutionService::new(
//!     InMemoryUrlRepository::new(),
//!     MokaUrlCache::new(),
//!     ResolverSettings::default(),
//! );
//!
//! let code = service.create_short_code("https://example.com", None).await?;
//! assert_eq!(service.resolve(&code).await?, "https://example.com");
//! # Ok(())
//! # }
//! ```

pub mod error;
mod guard;
pub mod resolver;
pub mod service;
pub mod settings;

pub use error::{ResolveError, Result};
pub use resolver::Resolver;
pub use service::ResolutionService;
pub use settings::ResolverSettings;
