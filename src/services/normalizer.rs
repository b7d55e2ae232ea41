use serde_json::Value;

use crate::models::{MediaDetail, MediaType, ProgressKey, ProgressRecord, RawProgress};

/// Normalizes one storage slot into a [`ProgressRecord`]
///
/// Returns `None` for anything that isn't usable progress: invalid JSON, a
/// shape no player writes, or playback numbers that are missing, negative or
/// not finite. Foreign data in storage must never abort a pass, so nothing
/// here is an error.
pub fn normalize(key: &ProgressKey, raw: &str) -> Option<ProgressRecord> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(key = %key, error = %e, "Skipping unparseable progress entry");
            return None;
        }
    };

    normalize_value(key, &value)
}

pub fn normalize_value(key: &ProgressKey, value: &Value) -> Option<ProgressRecord> {
    let decoded = RawProgress::decode(value);
    let (Some(schema), Some(playback)) = (decoded.schema(), decoded.playback()) else {
        tracing::debug!(key = %key, "Skipping unrecognized progress shape");
        return None;
    };

    if !is_usable(playback.position) || !is_usable(playback.duration) {
        tracing::debug!(key = %key, "Skipping progress entry with unusable numbers");
        return None;
    }

    // Season and episode only mean something for shows
    let (season, episode) = match key.media_type {
        MediaType::Tv => (
            playback.season.filter(|s| *s > 0),
            playback.episode.filter(|e| *e > 0),
        ),
        MediaType::Movie => (None, None),
    };

    Some(ProgressRecord {
        key: key.storage_key(),
        media_id: key.media_id.clone(),
        media_type: key.media_type,
        current_position: playback.position,
        total_duration: playback.duration,
        last_watched_at: playback.last_watched_at,
        season,
        episode,
        detail: cached_detail(value),
        schema,
    })
}

fn is_usable(n: f64) -> bool {
    n.is_finite() && n >= 0.0
}

/// A malformed cached detail is treated as missing so it gets refetched
fn cached_detail(value: &Value) -> Option<MediaDetail> {
    let detail = value.get("detail")?;
    if detail.is_null() {
        return None;
    }
    serde_json::from_value(detail.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProgressSchema;
    use serde_json::json;

    fn tv_key(id: &str) -> ProgressKey {
        ProgressKey::new(MediaType::Tv, id)
    }

    fn movie_key(id: &str) -> ProgressKey {
        ProgressKey::new(MediaType::Movie, id)
    }

    #[test]
    fn test_direct_schema_maps_fields() {
        let raw = r#"{"currentTime": 600, "duration": 2400, "lastWatched": 1700000000000, "season": 1, "episode": 4}"#;
        let record = normalize(&tv_key("1399"), raw).unwrap();

        assert_eq!(record.key, "progress_tv_1399");
        assert_eq!(record.media_id, "1399");
        assert_eq!(record.media_type, MediaType::Tv);
        assert_eq!(record.current_position, 600.0);
        assert_eq!(record.total_duration, 2400.0);
        assert_eq!(record.last_watched_at, 1700000000000);
        assert_eq!(record.season, Some(1));
        assert_eq!(record.episode, Some(4));
        assert_eq!(record.detail, None);
        assert_eq!(record.schema, ProgressSchema::Direct);
    }

    #[test]
    fn test_player_event_schema_maps_fields() {
        let raw = json!({
            "event": "pause",
            "data": { "currentTime": 90, "duration": 5400, "timestamp": 1700000005000i64 }
        })
        .to_string();
        let record = normalize(&movie_key("27205"), &raw).unwrap();

        assert_eq!(record.schema, ProgressSchema::PlayerEvent);
        assert_eq!(record.current_position, 90.0);
        assert_eq!(record.total_duration, 5400.0);
        assert_eq!(record.last_watched_at, 1700000005000);
    }

    #[test]
    fn test_namespaced_schema_maps_fields() {
        let raw = json!({
            "progress": { "watched": 120.0, "duration": 1320.0 },
            "last_updated": 1700000009000i64,
            "last_season_watched": "2",
            "last_episode_watched": "7"
        })
        .to_string();
        let record = normalize(&tv_key("94997"), &raw).unwrap();

        assert_eq!(record.schema, ProgressSchema::Namespaced);
        assert_eq!(record.current_position, 120.0);
        assert_eq!(record.season, Some(2));
        assert_eq!(record.episode, Some(7));
    }

    #[test]
    fn test_unrecognized_shape_yields_nothing() {
        assert_eq!(normalize(&movie_key("1"), r#"{"theme": "dark"}"#), None);
        assert_eq!(normalize(&movie_key("1"), r#"[600, 2400]"#), None);
    }

    #[test]
    fn test_unparseable_json_yields_nothing() {
        assert_eq!(normalize(&movie_key("1"), "{currentTime: 5"), None);
        assert_eq!(normalize(&movie_key("1"), ""), None);
    }

    #[test]
    fn test_negative_position_yields_nothing() {
        let raw = r#"{"currentTime": -5, "duration": 100}"#;
        assert_eq!(normalize(&movie_key("1"), raw), None);
    }

    #[test]
    fn test_movie_drops_season_and_episode() {
        let raw = r#"{"currentTime": 5, "duration": 100, "season": 1, "episode": 2}"#;
        let record = normalize(&movie_key("1"), raw).unwrap();
        assert_eq!(record.season, None);
        assert_eq!(record.episode, None);
    }

    #[test]
    fn test_zero_season_is_dropped() {
        let raw = r#"{"currentTime": 5, "duration": 100, "season": 0, "episode": 3}"#;
        let record = normalize(&tv_key("1"), raw).unwrap();
        assert_eq!(record.season, None);
        assert_eq!(record.episode, Some(3));
    }

    #[test]
    fn test_zero_duration_still_normalizes() {
        // Validity is the aggregator's call, not the normalizer's
        let raw = r#"{"currentTime": 5, "duration": 0}"#;
        let record = normalize(&movie_key("1"), raw).unwrap();
        assert!(!record.is_valid());
    }

    #[test]
    fn test_cached_detail_is_read() {
        let raw = json!({
            "currentTime": 5,
            "duration": 100,
            "detail": { "id": 1, "title": "Cached Title", "posterPath": "/p.jpg" }
        })
        .to_string();
        let record = normalize(&movie_key("1"), &raw).unwrap();

        let detail = record.detail.unwrap();
        assert_eq!(detail.title, "Cached Title");
        assert_eq!(detail.poster_path.as_deref(), Some("/p.jpg"));
    }

    #[test]
    fn test_malformed_cached_detail_reads_as_missing() {
        let raw = json!({ "currentTime": 5, "duration": 100, "detail": "oops" }).to_string();
        let record = normalize(&movie_key("1"), &raw).unwrap();
        assert_eq!(record.detail, None);
    }
}
