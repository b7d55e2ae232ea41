use chrono::Utc;
use serde::Deserialize;

use super::{MediaDetail, SeasonSummary};

// ============================================================================
// TMDB API Types
// ============================================================================

/// Response from GET /movie/{id}
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovieDetails {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub runtime: Option<u32>,
}

/// Response from GET /tv/{id}
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbTvDetails {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub episode_run_time: Vec<u32>,
    #[serde(default)]
    pub seasons: Vec<TmdbSeason>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbSeason {
    pub season_number: u32,
    pub name: String,
    #[serde(default)]
    pub episode_count: u32,
    #[serde(default)]
    pub poster_path: Option<String>,
}

/// TMDB sends empty strings for unknown dates and overviews
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<TmdbMovieDetails> for MediaDetail {
    fn from(movie: TmdbMovieDetails) -> Self {
        MediaDetail {
            id: movie.id,
            title: movie.title,
            overview: non_empty(movie.overview),
            poster_path: movie.poster_path,
            backdrop_path: movie.backdrop_path,
            release_date: non_empty(movie.release_date),
            runtime_minutes: movie.runtime.filter(|r| *r > 0),
            seasons: Vec::new(),
            fetched_at: Utc::now(),
        }
    }
}

impl From<TmdbTvDetails> for MediaDetail {
    fn from(show: TmdbTvDetails) -> Self {
        let seasons = show
            .seasons
            .into_iter()
            .map(|season| SeasonSummary {
                season_number: season.season_number,
                name: season.name,
                episode_count: season.episode_count,
                poster_path: season.poster_path,
            })
            .collect();

        MediaDetail {
            id: show.id,
            title: show.name,
            overview: non_empty(show.overview),
            poster_path: show.poster_path,
            backdrop_path: show.backdrop_path,
            release_date: non_empty(show.first_air_date),
            runtime_minutes: show.episode_run_time.first().copied(),
            seasons,
            fetched_at: Utc::now(),
        }
    }
}
