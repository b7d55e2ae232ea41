/// Catalog metadata provider abstraction
///
/// The enricher only needs one lookup: descriptive metadata for a numeric
/// catalog id. Providers implement it against a concrete catalog API (TMDB).
use crate::{
    error::AppResult,
    models::{MediaDetail, MediaType},
};

pub mod tmdb;

pub use tmdb::TmdbProvider;

/// Trait for catalog metadata providers
///
/// Implementations return an error on not-found or transport failure; callers
/// decide whether that is fatal.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Fetch title, artwork and season metadata for a catalog id
    async fn fetch_media_detail(&self, id: u64, media_type: MediaType) -> AppResult<MediaDetail>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
