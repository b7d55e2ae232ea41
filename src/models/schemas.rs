//! Player progress schemas found in storage.
//!
//! Embedded players write progress in their own shapes. Each shape gets a
//! typed decoder; [`RawProgress::decode`] tries them in a fixed order and the
//! first one that fits wins, even if a later one would also fit.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Which player shape a record was decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressSchema {
    Direct,
    PlayerEvent,
    Namespaced,
}

/// `{ currentTime, duration, lastWatched, season, episode }`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectProgress {
    pub current_time: f64,
    pub duration: f64,
    #[serde(default)]
    pub last_watched: f64,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub season: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub episode: Option<u32>,
}

/// `{ event, data: { currentTime, duration, timestamp, season, episode } }`
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerEventProgress {
    pub event: String,
    pub data: PlayerEventData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEventData {
    pub current_time: f64,
    pub duration: f64,
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub season: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub episode: Option<u32>,
}

/// `{ progress: { watched, duration }, last_updated, last_season_watched, last_episode_watched }`
#[derive(Debug, Clone, Deserialize)]
pub struct NamespacedProgress {
    pub progress: WatchedSpan,
    #[serde(default)]
    pub last_updated: f64,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub last_season_watched: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub last_episode_watched: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchedSpan {
    pub watched: f64,
    pub duration: f64,
}

/// Playback fields shared by every schema
#[derive(Debug, Clone, PartialEq)]
pub struct Playback {
    pub position: f64,
    pub duration: f64,
    pub last_watched_at: i64,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

#[derive(Debug, Clone)]
pub enum RawProgress {
    Direct(DirectProgress),
    PlayerEvent(PlayerEventProgress),
    Namespaced(NamespacedProgress),
    Unrecognized,
}

impl RawProgress {
    pub fn decode(value: &Value) -> Self {
        if !value.is_object() {
            return RawProgress::Unrecognized;
        }

        if let Ok(direct) = serde_json::from_value::<DirectProgress>(value.clone()) {
            return RawProgress::Direct(direct);
        }
        if let Ok(event) = serde_json::from_value::<PlayerEventProgress>(value.clone()) {
            return RawProgress::PlayerEvent(event);
        }
        if let Ok(namespaced) = serde_json::from_value::<NamespacedProgress>(value.clone()) {
            return RawProgress::Namespaced(namespaced);
        }

        RawProgress::Unrecognized
    }

    pub fn schema(&self) -> Option<ProgressSchema> {
        match self {
            RawProgress::Direct(_) => Some(ProgressSchema::Direct),
            RawProgress::PlayerEvent(_) => Some(ProgressSchema::PlayerEvent),
            RawProgress::Namespaced(_) => Some(ProgressSchema::Namespaced),
            RawProgress::Unrecognized => None,
        }
    }

    pub fn playback(&self) -> Option<Playback> {
        let playback = match self {
            RawProgress::Direct(p) => Playback {
                position: p.current_time,
                duration: p.duration,
                last_watched_at: p.last_watched as i64,
                season: p.season,
                episode: p.episode,
            },
            RawProgress::PlayerEvent(p) => Playback {
                position: p.data.current_time,
                duration: p.data.duration,
                last_watched_at: p.data.timestamp as i64,
                season: p.data.season,
                episode: p.data.episode,
            },
            RawProgress::Namespaced(p) => Playback {
                position: p.progress.watched,
                duration: p.progress.duration,
                last_watched_at: p.last_updated as i64,
                season: p.last_season_watched,
                episode: p.last_episode_watched,
            },
            RawProgress::Unrecognized => return None,
        };

        Some(playback)
    }
}

/// Accepts `3`, `"3"` or nothing. Anything else reads as absent.
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
