//! `DataSource` implementation over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use metrics::counter;
use reqwest::{header, Client, StatusCode};
use tracing::{debug, instrument, warn};

use nwp_common::{
    DataSource, FieldRequest, FieldSet, FrameError, FrameResult, SourceEndpoint, SourceTarget,
};

use crate::decode::decode_message;
use crate::error::SourceError;
use crate::idx::{ByteRange, Inventory};
use crate::template::{self, idx_url, TemplateVars};

/// HTTP client settings.
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    pub connect_timeout: Duration,
    /// Timeout for a single request (inventory or one message)
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
            user_agent: concat!("nwp-frames/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Reads GRIB2 files published on HTTP endpoints (NOMADS, AWS open data).
///
/// No retries: any transport failure means "not currently available".
#[derive(Clone)]
pub struct HttpGribSource {
    client: Client,
}

impl HttpGribSource {
    pub fn new(config: HttpSourceConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(config.user_agent)
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client (shared connection pool).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn head_ok(&self, url: &str) -> Result<(), SourceError> {
        let response = self.client.head(url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(SourceError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            })
        }
    }

    async fn get_inventory(&self, grib_url: &str) -> Result<Inventory, SourceError> {
        let url = idx_url(grib_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Status {
                status: response.status().as_u16(),
                url,
            });
        }
        let text = response.text().await?;
        Inventory::parse(&text)
    }

    async fn get_range(&self, url: &str, range: ByteRange) -> Result<Bytes, SourceError> {
        let response = self
            .client
            .get(url)
            .header(header::RANGE, range.header_value())
            .send()
            .await?;

        match response.status() {
            StatusCode::PARTIAL_CONTENT => {
                let body = response.bytes().await?;
                counter!("grib_source_bytes_total").increment(body.len() as u64);
                Ok(body)
            }
            // Server ignored the Range header and sent the whole file.
            StatusCode::OK => {
                let body = response.bytes().await?;
                counter!("grib_source_bytes_total").increment(body.len() as u64);
                let start = range.start as usize;
                let end = range
                    .end
                    .map_or(body.len(), |e| e as usize + 1)
                    .min(body.len());
                if start >= end {
                    return Err(SourceError::Decode(format!(
                        "range {} outside {} byte body from {}",
                        range.header_value(),
                        body.len(),
                        url
                    )));
                }
                Ok(body.slice(start..end))
            }
            status => Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }
}

/// GRIB2 URL for `target` at one endpoint.
pub fn file_url(target: &SourceTarget, endpoint: &SourceEndpoint) -> String {
    template::expand(
        &endpoint.url_template,
        &TemplateVars {
            model: &target.model,
            product: &target.product,
            run: target.run,
            forecast_hour: target.forecast_hour,
            member: target.ensemble_member,
        },
    )
}

#[async_trait]
impl DataSource for HttpGribSource {
    #[instrument(skip(self, target), fields(model = %target.model, fxx = target.forecast_hour))]
    async fn probe(&self, target: &SourceTarget) -> FrameResult<()> {
        let mut last_error = None;
        for endpoint in &target.sources {
            let url = idx_url(&file_url(target, endpoint));
            counter!("grib_source_probes_total").increment(1);
            match self.head_ok(&url).await {
                Ok(()) => {
                    debug!(source = %endpoint.name, url = %url, "Inventory found");
                    return Ok(());
                }
                Err(e) => {
                    debug!(source = %endpoint.name, error = %e, "Inventory not found");
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) => e.into(),
            None => FrameError::NotYetAvailable(format!("no sources configured for {}", target.model)),
        })
    }

    #[instrument(skip(self, request), fields(model = %request.target.model, fxx = request.target.forecast_hour))]
    async fn fetch(&self, request: &FieldRequest) -> FrameResult<FieldSet> {
        let target = &request.target;

        for endpoint in &target.sources {
            let url = file_url(target, endpoint);
            let inventory = match self.get_inventory(&url).await {
                Ok(inv) => inv,
                Err(SourceError::Inventory { line, content }) => {
                    warn!(source = %endpoint.name, line, content = %content, "Malformed inventory, trying next source");
                    continue;
                }
                Err(e) => {
                    debug!(source = %endpoint.name, error = %e, "Inventory unavailable, trying next source");
                    continue;
                }
            };

            let mut set = FieldSet {
                source: endpoint.name.clone(),
                ..Default::default()
            };

            for query in &request.queries {
                let Some(selector) = query.selector_for(&endpoint.name) else {
                    debug!(source = %endpoint.name, variable = %query.key, "No selector bound at this source");
                    continue;
                };
                let accumulation = query.accumulated.then_some(target.forecast_hour);
                let Some((range, submessage)) = inventory.find(selector, accumulation).and_then(|i| {
                    let range = inventory.byte_range(i)?;
                    Some((range, inventory.entries()[i].submessage_index()))
                }) else {
                    debug!(source = %endpoint.name, variable = %query.key, selector = %selector, "Selector not in inventory");
                    continue;
                };

                let bytes = match self.get_range(&url, range).await {
                    Ok(b) => b,
                    Err(e) => {
                        warn!(source = %endpoint.name, variable = %query.key, error = %e, "Message download failed");
                        continue;
                    }
                };

                let decoded = tokio::task::spawn_blocking(move || decode_message(&bytes, submessage))
                    .await
                    .map_err(|e| SourceError::Decode(e.to_string()))
                    .and_then(|r| r);
                match decoded {
                    Ok(field) => {
                        set.fields.insert(query.key.clone(), field);
                    }
                    Err(e) => {
                        warn!(source = %endpoint.name, variable = %query.key, error = %e, "Message decode failed");
                    }
                }
            }

            if set.fields.is_empty() && !request.queries.is_empty() {
                return Err(FrameError::EmptyResult(format!(
                    "{} f{:03}: none of {} selectors found at {}",
                    target.model,
                    target.forecast_hour,
                    request.queries.len(),
                    endpoint.name
                )));
            }
            return Ok(set);
        }

        Err(FrameError::NotYetAvailable(format!(
            "{} {} f{:03}: no inventory at any source",
            target.model,
            target.run.format("%Y%m%d%H"),
            target.forecast_hour
        )))
    }
}
