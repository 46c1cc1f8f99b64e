pub mod config;
pub mod error;
pub mod metrics;
pub mod tracker;
pub mod writer;

pub use config::Config;
pub use error::{Error, Result};
pub use metrics::{FailureReason, Metric, MetricSet, MetricValue, Timestamp};
pub use tracker::{Credentials, JiraClient, Tracker};
pub use writer::{InfluxWriter, MetricWriter};

/// Outcome of one polling run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub values: MetricSet,
    /// Shared timestamp of the written metrics; `None` on a dry run.
    pub timestamp: Option<Timestamp>,
    pub written: usize,
}

/// Collects dashboard metrics from the tracker and hands them to a writer.
pub struct JiraDash {
    config: Config,
    tracker: Box<dyn Tracker>,
}

impl JiraDash {
    pub fn new(config: Config, tracker: Box<dyn Tracker>) -> Self {
        Self { config, tracker }
    }

    /// Compute every configured metric.
    ///
    /// Tracker failures abort the collection, except an authorization
    /// failure anywhere in the velocity computation (sprint listing or an
    /// estimate lookup), which is recorded as `AUTH_ERROR`.
    pub async fn collect(&self) -> Result<MetricSet> {
        let tracker = self.tracker.as_ref();
        let mut values = MetricSet::new();

        for q in &self.config.counts {
            let count = metrics::issue_count(tracker, q.filter).await?;
            values.insert(q.key.clone(), MetricValue::Numeric(count as f64));
        }

        for q in &self.config.field_sums {
            let sum = metrics::field_sum(tracker, q.filter, &q.field).await?;
            let sum = match q.decimals {
                Some(places) => metrics::round_to(sum, places),
                None => sum,
            };
            values.insert(q.key.clone(), MetricValue::Numeric(sum));
        }

        if let Some(v) = self.config.velocity() {
            let pattern = v.pattern()?;
            let value =
                match metrics::sprint_velocity(tracker, v.board, pattern.as_ref(), v.window).await {
                    Ok(avg) => MetricValue::Numeric(avg),
                    Err(e) if e.is_auth_denied() => {
                        log::warn!("Auth error computing {}: {e}", v.key);
                        MetricValue::Error(FailureReason::AuthError)
                    }
                    Err(e) => return Err(e),
                };
            values.insert(v.key.clone(), value);
        }

        Ok(values)
    }

    /// Collect, then write every value unless `dry_run` is set.
    pub async fn run(&self, writer: &dyn MetricWriter, dry_run: bool) -> Result<RunReport> {
        let values = self.collect().await?;
        if dry_run {
            return Ok(RunReport {
                values,
                timestamp: None,
                written: 0,
            });
        }

        let timestamp = Timestamp::now();
        let written = publish(writer, &values, timestamp).await?;
        Ok(RunReport {
            values,
            timestamp: Some(timestamp),
            written,
        })
    }
}

/// Write each value individually, all stamped with `timestamp`.
/// Stops at the first writer failure.
pub async fn publish(
    writer: &dyn MetricWriter,
    values: &MetricSet,
    timestamp: Timestamp,
) -> Result<usize> {
    for (key, value) in values {
        writer
            .write(&Metric {
                key,
                value: *value,
                timestamp,
            })
            .await?;
    }
    log::info!("Wrote {} metrics at {}", values.len(), timestamp.as_nanos());
    Ok(values.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CountQuery, FieldSumQuery, VelocityConfig};
    use crate::metrics::testing::{issue, issues, FakeTracker};
    use crate::tracker::SprintState;
    use crate::writer::testing::RecordingWriter;
    use serde_json::json;

    fn test_config() -> Config {
        Config {
            counts: vec![
                CountQuery {
                    key: "dc_inbox".into(),
                    filter: 1,
                },
                CountQuery {
                    key: "CA,priority=Blocker".into(),
                    filter: 2,
                },
            ],
            field_sums: vec![
                FieldSumQuery {
                    key: "CA,priority=QRF".into(),
                    filter: 3,
                    field: "drv".into(),
                    decimals: Some(3),
                },
                FieldSumQuery {
                    key: "backlog_depth".into(),
                    filter: 4,
                    field: "points".into(),
                    decimals: Some(2),
                },
            ],
            velocity: VelocityConfig {
                enabled: true,
                key: "sprint_velocity".into(),
                board: 70,
                sprint_pattern: Some(r"xs-ring3\s.+".into()),
                window: 3,
            },
            ..Config::default()
        }
    }

    fn test_tracker() -> FakeTracker {
        FakeTracker::default()
            .with_filter(1, issues(4))
            .with_filter(2, issues(0))
            .with_filter(
                3,
                vec![
                    issue("CA-1", "drv", json!(7.0)),
                    issue("CA-2", "drv", json!(0.3335)),
                    issue("CA-3", "drv", json!(null)),
                ],
            )
            .with_filter(
                4,
                vec![
                    issue("CA-4", "points", json!(7.0)),
                    issue("CA-5", "points", json!(0.3335)),
                ],
            )
            .with_sprint(8, "xs-ring3 Sprint 8", SprintState::Closed, Some(9.0))
            .with_sprint(9, "xs-ring3 Sprint 9", SprintState::Closed, Some(12.0))
            .with_sprint(10, "other-team Sprint 10", SprintState::Closed, Some(100.0))
    }

    #[tokio::test]
    async fn test_collect_all_metrics() {
        let dash = JiraDash::new(test_config(), Box::new(test_tracker()));
        let values = dash.collect().await.unwrap();

        assert_eq!(values.len(), 5);
        assert_eq!(values["dc_inbox"], MetricValue::Numeric(4.0));
        assert_eq!(values["CA,priority=Blocker"], MetricValue::Numeric(0.0));
        assert_eq!(values["CA,priority=QRF"], MetricValue::Numeric(7.334));
        assert_eq!(values["backlog_depth"], MetricValue::Numeric(7.33));
        assert_eq!(values["sprint_velocity"], MetricValue::Numeric(10.5));
    }

    #[tokio::test]
    async fn test_velocity_auth_failure_degrades_to_sentinel() {
        let mut tracker = test_tracker();
        tracker.sprints_status = Some(403);
        let dash = JiraDash::new(test_config(), Box::new(tracker));

        let values = dash.collect().await.unwrap();
        assert_eq!(
            values["sprint_velocity"],
            MetricValue::Error(FailureReason::AuthError)
        );
        assert_eq!(values["dc_inbox"], MetricValue::Numeric(4.0));
    }

    #[tokio::test]
    async fn test_estimate_auth_failure_degrades_to_sentinel() {
        let mut tracker = test_tracker();
        tracker.failing_estimates.insert(9, 403);
        let dash = JiraDash::new(test_config(), Box::new(tracker));

        let values = dash.collect().await.unwrap();
        assert_eq!(
            values["sprint_velocity"],
            MetricValue::Error(FailureReason::AuthError)
        );
    }

    #[tokio::test]
    async fn test_estimate_server_error_is_fatal() {
        let mut tracker = test_tracker();
        tracker.failing_estimates.insert(9, 500);
        let dash = JiraDash::new(test_config(), Box::new(tracker));

        let err = dash.collect().await.unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn test_disabled_velocity_is_not_collected() {
        let mut config = test_config();
        config.velocity.enabled = false;
        let mut tracker = test_tracker();
        tracker.sprints_status = Some(500);
        let dash = JiraDash::new(config, Box::new(tracker));

        let values = dash.collect().await.unwrap();
        assert_eq!(values.len(), 4);
        assert!(!values.contains_key("sprint_velocity"));
    }

    #[tokio::test]
    async fn test_velocity_other_failure_is_fatal() {
        let mut tracker = test_tracker();
        tracker.sprints_status = Some(500);
        let dash = JiraDash::new(test_config(), Box::new(tracker));

        let err = dash.collect().await.unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn test_unknown_filter_aborts_collection() {
        let mut config = test_config();
        config.counts.push(CountQuery {
            key: "XOP".into(),
            filter: 999,
        });
        let dash = JiraDash::new(config, Box::new(test_tracker()));
        assert!(dash.collect().await.is_err());
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let dash = JiraDash::new(test_config(), Box::new(test_tracker()));
        let writer = RecordingWriter::default();

        let report = dash.run(&writer, true).await.unwrap();
        assert!(writer.calls().is_empty());
        assert_eq!(report.written, 0);
        assert_eq!(report.timestamp, None);
        assert_eq!(report.values.len(), 5);
    }

    #[tokio::test]
    async fn test_run_writes_every_value_with_one_timestamp() {
        let dash = JiraDash::new(test_config(), Box::new(test_tracker()));
        let writer = RecordingWriter::default();

        let report = dash.run(&writer, false).await.unwrap();
        let calls = writer.calls();
        assert_eq!(calls.len(), 5);
        assert_eq!(report.written, 5);

        let stamp = report.timestamp.unwrap();
        assert!(calls.iter().all(|(_, _, ts)| *ts == stamp));
        assert_eq!(stamp.as_nanos() % 1_000_000_000, 0);

        let keys: Vec<&str> = calls.iter().map(|(k, _, _)| k.as_str()).collect();
        for key in report.values.keys() {
            assert!(keys.contains(&key.as_str()));
        }
    }

    #[tokio::test]
    async fn test_publish_uses_given_timestamp() {
        let mut values = MetricSet::new();
        values.insert("a".into(), MetricValue::Numeric(1.0));
        values.insert("b".into(), MetricValue::Error(FailureReason::AuthError));
        let writer = RecordingWriter::default();

        let n = publish(&writer, &values, Timestamp::from_secs(42)).await.unwrap();
        assert_eq!(n, 2);
        assert_eq!(
            writer.calls(),
            vec![
                ("a".to_string(), MetricValue::Numeric(1.0), Timestamp(42_000_000_000)),
                (
                    "b".to_string(),
                    MetricValue::Error(FailureReason::AuthError),
                    Timestamp(42_000_000_000)
                ),
            ]
        );
    }
}
