//! Title rating aggregation.
//!
//! A title's rating is the arithmetic mean of its review scores, or `None`
//! without reviews. It is recomputed from the reviews table on every read.

use std::collections::HashMap;

use model::entities::review;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};
use tracing::{debug, instrument};

use crate::error::Result;

/// Mean of `scores`, `None` for an empty slice.
pub fn average_score(scores: &[i32]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let sum: i64 = scores.iter().map(|&s| i64::from(s)).sum();
    Some(sum as f64 / scores.len() as f64)
}

/// Ratings for a batch of titles. Titles without reviews are absent from the
/// returned map.
#[instrument(skip(db, title_ids), fields(num_titles = title_ids.len()))]
pub async fn title_ratings<C: ConnectionTrait>(
    db: &C,
    title_ids: &[i32],
) -> Result<HashMap<i32, f64>> {
    if title_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(i32, i32)> = review::Entity::find()
        .select_only()
        .column(review::Column::TitleId)
        .column(review::Column::Score)
        .filter(review::Column::TitleId.is_in(title_ids.iter().copied()))
        .into_tuple()
        .all(db)
        .await?;

    let mut scores: HashMap<i32, Vec<i32>> = HashMap::new();
    for (title_id, score) in rows {
        scores.entry(title_id).or_default().push(score);
    }

    let ratings: HashMap<i32, f64> = scores
        .into_iter()
        .filter_map(|(title_id, scores)| average_score(&scores).map(|avg| (title_id, avg)))
        .collect();
    debug!("Computed ratings for {} of {} titles", ratings.len(), title_ids.len());

    Ok(ratings)
}
