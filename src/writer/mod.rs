use async_trait::async_trait;
use url::Url;

use crate::error::{Error, Result};
use crate::metrics::{Metric, MetricValue};

/// Destination for collected metrics.
#[async_trait]
pub trait MetricWriter: Send + Sync {
    async fn write(&self, metric: &Metric<'_>) -> Result<()>;
}

/// Writes metrics to an InfluxDB line-protocol HTTP endpoint.
///
/// The database is part of the write URI, e.g. `http://host:8086/write?db=name`.
pub struct InfluxWriter {
    http: reqwest::Client,
    url: Url,
}

impl InfluxWriter {
    pub fn new(write_url: &str) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            url: Url::parse(write_url)?,
        })
    }
}

#[async_trait]
impl MetricWriter for InfluxWriter {
    async fn write(&self, metric: &Metric<'_>) -> Result<()> {
        let Some(line) = encode_line(metric) else {
            log::warn!(
                "Skipping {}: {} has no line-protocol representation",
                metric.key,
                metric.value
            );
            return Ok(());
        };
        log::debug!("POST {} {line}", self.url);

        let write_err = |message: String| Error::Write {
            key: metric.key.to_string(),
            message,
        };
        let resp = self
            .http
            .post(self.url.clone())
            .body(line)
            .send()
            .await
            .map_err(|e| write_err(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(write_err(format!("{status}: {}", body.trim())));
        }
        Ok(())
    }
}

/// Encode a metric as one line-protocol record.
///
/// The key is used verbatim as measurement plus tags, so `CA,priority=Major`
/// keeps its tag. Returns `None` for non-finite numbers.
pub fn encode_line(metric: &Metric<'_>) -> Option<String> {
    let field = match metric.value {
        MetricValue::Numeric(v) if v.is_finite() => v.to_string(),
        MetricValue::Numeric(_) => return None,
        MetricValue::Error(reason) => format!("\"{}\"", escape_string_field(reason.as_str())),
    };
    Some(format!(
        "{} value={field} {}",
        metric.key.replace(' ', "\\ "),
        metric.timestamp.as_nanos()
    ))
}

fn escape_string_field(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
