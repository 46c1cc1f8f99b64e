pub mod client;
pub mod types;

pub use client::{Credentials, JiraClient};
pub use types::*;

use async_trait::async_trait;

use crate::error::Result;

/// Read-only view of the issue tracker used by the aggregators.
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Resolve a saved filter to its JQL query.
    async fn filter_jql(&self, filter_id: u64) -> Result<String>;

    /// Search issues by JQL, populating only `fields`.
    /// With `limit` set, a single page of at most that many issues is fetched;
    /// otherwise every matching issue is returned.
    async fn search_issues(
        &self,
        jql: &str,
        fields: &[&str],
        limit: Option<u32>,
    ) -> Result<SearchPage>;

    /// All sprints of a board, in server order.
    async fn sprints(&self, board_id: u64) -> Result<Vec<Sprint>>;

    /// Sum of the estimates of issues completed in a sprint.
    /// Fails with `Error::NotFound` when the board has no such figure.
    async fn completed_issues_estimate_sum(&self, board_id: u64, sprint_id: u64) -> Result<f64>;
}
