use std::collections::HashMap;

use crate::models::{MediaType, ProgressRecord};

/// Produces the final continue-watching list
///
/// Drops empty slots, keeps the later of two records for the same title, then
/// drops finished or durationless records and orders by most recently watched.
/// A finished later record therefore hides an earlier unfinished one. The sort
/// is stable so equal timestamps keep their storage order.
pub fn aggregate(records: Vec<Option<ProgressRecord>>) -> Vec<ProgressRecord> {
    let mut list: Vec<ProgressRecord> = Vec::new();
    let mut positions: HashMap<(MediaType, String), usize> = HashMap::new();

    for record in records.into_iter().flatten() {
        let identity = (record.media_type, record.media_id.clone());
        match positions.get(&identity).copied() {
            Some(index) => list[index] = record,
            None => {
                positions.insert(identity, list.len());
                list.push(record);
            }
        }
    }

    list.retain(ProgressRecord::is_valid);
    list.sort_by(|a, b| b.last_watched_at.cmp(&a.last_watched_at));
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProgressSchema;

    fn record(media_id: &str, last_watched_at: i64) -> ProgressRecord {
        ProgressRecord {
            key: format!("progress_movie_{}", media_id),
            media_id: media_id.to_string(),
            media_type: MediaType::Movie,
            current_position: 10.0,
            total_duration: 100.0,
            last_watched_at,
            season: None,
            episode: None,
            detail: None,
            schema: ProgressSchema::Direct,
        }
    }

    fn ids(list: &[ProgressRecord]) -> Vec<&str> {
        list.iter().map(|r| r.media_id.as_str()).collect()
    }

    #[test]
    fn test_sorts_most_recent_first() {
        let list = aggregate(vec![
            Some(record("a", 100)),
            Some(record("b", 300)),
            Some(record("c", 200)),
        ]);

        let order: Vec<i64> = list.iter().map(|r| r.last_watched_at).collect();
        assert_eq!(order, vec![300, 200, 100]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let list = aggregate(vec![
            Some(record("first", 500)),
            Some(record("newest", 900)),
            Some(record("second", 500)),
        ]);

        assert_eq!(ids(&list), vec!["newest", "first", "second"]);
    }

    #[test]
    fn test_drops_empty_slots() {
        let list = aggregate(vec![None, Some(record("a", 1)), None]);
        assert_eq!(ids(&list), vec!["a"]);
    }

    #[test]
    fn test_completion_threshold() {
        let mut almost = record("almost", 1);
        almost.current_position = 94.0;
        let mut finished = record("finished", 2);
        finished.current_position = 95.0;

        let list = aggregate(vec![Some(almost), Some(finished)]);
        assert_eq!(ids(&list), vec!["almost"]);
    }

    #[test]
    fn test_zero_duration_dropped() {
        let mut broken = record("broken", 1);
        broken.total_duration = 0.0;
        broken.current_position = 0.0;

        assert!(aggregate(vec![Some(broken)]).is_empty());
    }

    #[test]
    fn test_duplicate_title_later_wins() {
        let mut later = record("a", 50);
        later.current_position = 40.0;

        let list = aggregate(vec![Some(record("a", 10)), Some(record("b", 20)), Some(later)]);

        assert_eq!(list.len(), 2);
        let a = list.iter().find(|r| r.media_id == "a").unwrap();
        assert_eq!(a.current_position, 40.0);
        assert_eq!(ids(&list), vec!["a", "b"]);
    }

    #[test]
    fn test_finished_later_record_hides_earlier() {
        let mut finished = record("a", 2);
        finished.current_position = 99.0;

        let list = aggregate(vec![Some(record("a", 1)), Some(finished)]);
        assert!(list.is_empty());
    }

    #[test]
    fn test_unfinished_later_record_replaces_finished() {
        let mut finished = record("a", 1);
        finished.current_position = 99.0;
        let mut rewatch = record("a", 2);
        rewatch.current_position = 5.0;

        let list = aggregate(vec![Some(finished), Some(record("b", 3)), Some(rewatch)]);
        assert_eq!(ids(&list), vec!["b", "a"]);
        assert_eq!(list[1].current_position, 5.0);
    }

    #[test]
    fn test_same_id_different_media_type_not_merged() {
        let mut show = record("42", 1);
        show.media_type = MediaType::Tv;
        show.key = "progress_tv_42".to_string();

        let list = aggregate(vec![Some(record("42", 2)), Some(show)]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate(Vec::new()).is_empty());
    }
}
