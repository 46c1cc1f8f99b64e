pub mod types;

pub use types::*;

use regex::Regex;

use crate::error::Result;
use crate::tracker::{Issue, Sprint, Tracker};

const KEY_FIELD: &str = "key";

/// Number of issues matching a saved filter.
///
/// Only one issue is fetched; the count comes from the search total.
pub async fn issue_count(tracker: &dyn Tracker, filter_id: u64) -> Result<u64> {
    let jql = tracker.filter_jql(filter_id).await?;
    let page = tracker.search_issues(&jql, &[KEY_FIELD], Some(1)).await?;
    log::debug!("filter {filter_id}: {} issues", page.total);
    Ok(page.total)
}

/// Sum of a numeric field over every issue matching a saved filter.
pub async fn field_sum(tracker: &dyn Tracker, filter_id: u64, field: &str) -> Result<f64> {
    let jql = tracker.filter_jql(filter_id).await?;
    let page = tracker.search_issues(&jql, &[field], None).await?;
    let sum = sum_field(&page.issues, field);
    log::debug!(
        "filter {filter_id}: sum of {field} over {} issues = {sum}",
        page.issues.len()
    );
    Ok(sum)
}

/// Sum a field across issues. Missing and null values count as zero.
pub fn sum_field(issues: &[Issue], field: &str) -> f64 {
    sum_values(issues.iter().map(|i| i.number_field(field)))
}

pub fn sum_values<I: IntoIterator<Item = Option<f64>>>(values: I) -> f64 {
    values.into_iter().flatten().sum()
}

/// Round to `places` decimal places, halves away from zero.
pub fn round_to(value: f64, places: u32) -> f64 {
    let scale = 10f64.powi(places as i32);
    (value * scale).round() / scale
}

/// Average completed estimate of the most recent closed sprints on a board.
///
/// Sprints whose estimate lookup reports "not found" are skipped. When no
/// sprint yields a value the result is NaN. Any other error, from the sprint
/// listing or an estimate lookup, is returned to the caller to classify.
pub async fn sprint_velocity(
    tracker: &dyn Tracker,
    board_id: u64,
    pattern: Option<&Regex>,
    window: usize,
) -> Result<f64> {
    let sprints = tracker.sprints(board_id).await?;
    let selected = select_recent_closed(sprints, pattern, window);

    let mut sums = Vec::with_capacity(selected.len());
    for sprint in &selected {
        match tracker
            .completed_issues_estimate_sum(board_id, sprint.id)
            .await
        {
            Ok(v) => sums.push(v),
            Err(e) if e.is_not_found() => {
                log::warn!("Skipping sprint {} ({}): {e}", sprint.id, sprint.name);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(mean_rounded(&sums, 1))
}

/// Closed sprints matching `pattern`, highest id first, at most `window` of them.
///
/// Sprint ids are assumed to grow with creation time, so the highest ids
/// are taken as the most recent.
pub fn select_recent_closed(
    sprints: Vec<Sprint>,
    pattern: Option<&Regex>,
    window: usize,
) -> Vec<Sprint> {
    let mut closed: Vec<Sprint> = sprints
        .into_iter()
        .filter(|s| pattern.map_or(true, |re| re.is_match(&s.name)))
        .filter(Sprint::is_closed)
        .collect();
    closed.sort_by(|a, b| b.id.cmp(&a.id));
    closed.truncate(window);
    closed
}

/// Arithmetic mean rounded to `places`; NaN for an empty slice.
pub fn mean_rounded(values: &[f64], places: u32) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    round_to(mean, places)
}
