use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use crate::error::AppError;

pub mod schemas;
pub mod tmdb;

pub use schemas::{Playback, ProgressSchema, RawProgress};

/// Namespace shared by every progress slot in storage
pub const PROGRESS_KEY_PREFIX: &str = "progress_";

/// Watched fraction at or above which a title counts as finished
pub const COMPLETION_THRESHOLD: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaType::Movie),
            "tv" => Ok(MediaType::Tv),
            other => Err(AppError::InvalidInput(format!(
                "Unknown media type: {}",
                other
            ))),
        }
    }
}

/// Parsed form of a `progress_{mediaType}_{mediaId}` storage key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgressKey {
    pub media_type: MediaType,
    pub media_id: String,
}

impl ProgressKey {
    pub fn new(media_type: MediaType, media_id: impl Into<String>) -> Self {
        Self {
            media_type,
            media_id: media_id.into(),
        }
    }

    /// Parses a storage key positionally on `_`.
    ///
    /// The id is everything after the media type segment, so ids containing
    /// `_` survive intact. Returns `None` for keys outside the convention.
    pub fn parse(key: &str) -> Option<Self> {
        let mut parts = key.splitn(3, '_');

        if parts.next()? != "progress" {
            return None;
        }

        let media_type = parts.next()?.parse().ok()?;
        let media_id = parts.next()?;

        if media_id.is_empty() {
            return None;
        }

        Some(Self::new(media_type, media_id))
    }

    /// Whether a raw key falls inside the progress namespace at all
    pub fn in_namespace(key: &str) -> bool {
        key.starts_with(PROGRESS_KEY_PREFIX)
    }

    pub fn storage_key(&self) -> String {
        self.to_string()
    }
}

impl Display for ProgressKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}_{}",
            PROGRESS_KEY_PREFIX, self.media_type, self.media_id
        )
    }
}

/// Unified progress record derived from any supported player schema
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub key: String,
    pub media_id: String,
    pub media_type: MediaType,
    pub current_position: f64,
    pub total_duration: f64,
    /// Epoch milliseconds
    pub last_watched_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<MediaDetail>,
    pub schema: ProgressSchema,
}

impl ProgressRecord {
    /// Fraction of the runtime already watched. Zero when the duration is unusable.
    pub fn watched_fraction(&self) -> f64 {
        if self.total_duration > 0.0 {
            self.current_position / self.total_duration
        } else {
            0.0
        }
    }

    /// A record is shown only while it has a real duration and is unfinished
    pub fn is_valid(&self) -> bool {
        self.total_duration > 0.0 && self.watched_fraction() < COMPLETION_THRESHOLD
    }

    pub fn has_detail(&self) -> bool {
        self.detail.is_some()
    }
}

/// Descriptive catalog metadata attached to a progress record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaDetail {
    pub id: u64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backdrop_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seasons: Vec<SeasonSummary>,
    #[serde(default = "Utc::now")]
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeasonSummary {
    pub season_number: u32,
    pub name: String,
    #[serde(default)]
    pub episode_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
}
