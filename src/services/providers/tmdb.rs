/// TMDB catalog provider
///
/// Looks up descriptive metadata for progress records.
///
/// API Flow:
/// 1. Movies: /movie/{id} → title, artwork, release date, runtime
/// 2. TV: /tv/{id} → name, artwork, first air date, season list
use crate::{
    error::{AppError, AppResult},
    models::{
        tmdb::{TmdbMovieDetails, TmdbTvDetails},
        MediaDetail, MediaType,
    },
    services::providers::CatalogProvider,
};
use reqwest::{Client as HttpClient, StatusCode};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct TmdbProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

impl TmdbProvider {
    pub fn new(api_key: String, api_url: String) -> Self {
        Self {
            http_client: HttpClient::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    fn detail_url(&self, id: u64, media_type: MediaType) -> String {
        format!("{}/{}/{}", self.api_url, media_type, id)
    }

    /// Decodes a detail response body for the given media type
    fn parse_detail(media_type: MediaType, body: &str) -> AppResult<MediaDetail> {
        let detail = match media_type {
            MediaType::Movie => serde_json::from_str::<TmdbMovieDetails>(body).map(MediaDetail::from),
            MediaType::Tv => serde_json::from_str::<TmdbTvDetails>(body).map(MediaDetail::from),
        };

        detail.map_err(|e| {
            tracing::error!(
                error = %e,
                media_type = %media_type,
                "Failed to deserialize TMDB response"
            );
            AppError::ExternalApi(format!("Failed to parse TMDB response: {}", e))
        })
    }
}

#[async_trait::async_trait]
impl CatalogProvider for TmdbProvider {
    async fn fetch_media_detail(&self, id: u64, media_type: MediaType) -> AppResult<MediaDetail> {
        let url = self.detail_url(id, media_type);

        tracing::debug!(tmdb_id = id, media_type = %media_type, "Fetching detail from TMDB");

        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("TMDB {} {}", media_type, id)));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                tmdb_id = id,
                status = %status,
                body = %body,
                "TMDB request failed"
            );
            return Err(AppError::ExternalApi(format!(
                "TMDB returned status {}: {}",
                status, body
            )));
        }

        let body = response.text().await?;
        let detail = Self::parse_detail(media_type, &body)?;

        tracing::info!(
            tmdb_id = id,
            media_type = %media_type,
            title = %detail.title,
            provider = "tmdb",
            "Detail fetched"
        );

        Ok(detail)
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}
