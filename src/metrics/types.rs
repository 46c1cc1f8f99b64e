use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

/// Why a metric could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The tracker denied access to the data behind the metric.
    AuthError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::AuthError => "AUTH_ERROR",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of a dashboard metric: a number, or the reason there is none.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Numeric(f64),
    Error(FailureReason),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Numeric(v) => write!(f, "{v}"),
            MetricValue::Error(reason) => write!(f, "{reason}"),
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Numeric(v) => serializer.serialize_f64(*v),
            MetricValue::Error(reason) => serializer.serialize_str(reason.as_str()),
        }
    }
}

/// Nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current wall-clock time truncated to whole seconds.
    pub fn now() -> Self {
        Self::from_secs(chrono::Utc::now().timestamp())
    }

    pub fn from_secs(secs: i64) -> Self {
        Timestamp(secs * 1_000_000_000)
    }

    pub fn as_nanos(&self) -> i64 {
        self.0
    }
}

/// One persisted data point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric<'a> {
    pub key: &'a str,
    pub value: MetricValue,
    pub timestamp: Timestamp,
}

/// All values collected in one run, keyed by dashboard metric key.
pub type MetricSet = BTreeMap<String, MetricValue>;
