//! Ranking order for the application list view.

use std::cmp::Ordering;

use crate::models::ApplicationRow;

/// Sorts applications for presentation: scored rows first, descending by
/// match score; unscored rows (still pending/processing, or failed) after all
/// scored ones. The input must be in creation order — the sort is stable, so
/// ties and unscored rows keep that order, making repeated queries
/// deterministic.
pub fn rank_by_match(applications: &mut [ApplicationRow]) {
    applications.sort_by(|a, b| match (a.match_score, b.match_score) {
        (Some(left), Some(right)) => right.partial_cmp(&left).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}
