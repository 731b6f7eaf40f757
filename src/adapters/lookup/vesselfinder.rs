//! Vessel Details Client - Rate-limited IMO → MMSI Page Lookup
//!
//! One GET per attempt against `{base_url}/vessels/details/{imo}` with a
//! short timeout and browser-like headers. The MMSI is scraped from the
//! combined `IMO / MMSI` table cell; retries belong to the worker pool.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, instrument};

use crate::domain::error::LookupError;
use crate::domain::vessel::{ImoNumber, Mmsi};
use crate::ports::identity_lookup::IdentityLookup;

/// Label of the table cell holding `<imo> / <mmsi>`.
const IDENTITY_MARKER: &str = "IMO / MMSI";

/// Browser-like `Accept` header.
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Configuration for the lookup client.
#[derive(Debug, Clone)]
pub struct LookupClientConfig {
  /// Scheme and host, without trailing slash.
  pub base_url: String,
  /// Per-request timeout.
  pub timeout: Duration,
  /// Sent as `User-Agent`.
  pub user_agent: String,
  /// Outbound request budget shared by all workers.
  pub requests_per_minute: u32,
}

impl Default for LookupClientConfig {
  fn default() -> Self {
    Self {
      base_url: "https://www.vesselfinder.com".to_string(),
      timeout: Duration::from_secs(5),
      user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/91.0.4472.124".to_string(),
      requests_per_minute: 60,
    }
  }
}

/// HTTP implementation of the `IdentityLookup` port.
pub struct VesselFinderClient {
  http: Client,
  base_url: String,
  limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl VesselFinderClient {
  pub fn new(config: &LookupClientConfig) -> Result<Self> {
    let mut headers = HeaderMap::new();
    headers.insert(
      USER_AGENT,
      HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
    );
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));

    let http = Client::builder()
      .timeout(config.timeout)
      .default_headers(headers)
      .pool_max_idle_per_host(5)
      .build()
      .context("Failed to build HTTP client")?;

    let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);

    Ok(Self {
      http,
      base_url: config.base_url.trim_end_matches('/').to_string(),
      limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
    })
  }

  fn details_url(&self, imo: &ImoNumber) -> String {
    format!("{}/vessels/details/{imo}", self.base_url)
  }
}

#[async_trait]
impl IdentityLookup for VesselFinderClient {
  #[instrument(skip(self), fields(imo = %imo))]
  async fn lookup_mmsi(&self, imo: &ImoNumber) -> Result<Mmsi, LookupError> {
    self.limiter.until_ready().await;

    let response = self
      .http
      .get(self.details_url(imo))
      .send()
      .await
      .map_err(|e| LookupError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      return Err(LookupError::Status(status.as_u16()));
    }

    let body = response
      .text()
      .await
      .map_err(|e| LookupError::Network(e.to_string()))?;
    let mmsi = parse_mmsi_from_html(&body)?;

    debug!(mmsi = %mmsi, "Lookup succeeded");
    Ok(mmsi)
  }
}

/// Extract the MMSI from a vessel details page.
///
/// Finds the `IMO / MMSI` label, takes the text of the next table cell
/// (`9321483 / 220417000`) and returns the part after the slash.
pub fn parse_mmsi_from_html(body: &str) -> Result<Mmsi, LookupError> {
  let label = body
    .find(IDENTITY_MARKER)
    .ok_or(LookupError::MarkerNotFound)?;
  let rest = &body[label + IDENTITY_MARKER.len()..];

  let cell = rest
    .find("<td")
    .ok_or_else(|| LookupError::MalformedField("no value cell after marker".to_string()))?;
  let rest = &rest[cell..];
  let open_end = rest
    .find('>')
    .ok_or_else(|| LookupError::MalformedField("unterminated value cell".to_string()))?;
  let rest = &rest[open_end + 1..];
  let value = rest.find('<').map_or(rest, |end| &rest[..end]);

  let parts: Vec<&str> = value.split('/').collect();
  let [_, mmsi] = parts.as_slice() else {
    return Err(LookupError::MalformedField(value.trim().to_string()));
  };

  let mmsi = mmsi.trim();
  Mmsi::parse(mmsi).map_err(|_| LookupError::InvalidMmsi(mmsi.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;

  const PAGE: &str = r#"<table class="aparams"><tr><td class="n3">IMO / MMSI</td><td class="v3 v3np">9321483 / 220417000</td></tr></table>"#;

  #[test]
  fn test_mmsi_is_second_half_of_identity_cell() {
    assert_eq!(parse_mmsi_from_html(PAGE).unwrap().as_str(), "220417000");
  }

  #[test]
  fn test_missing_marker() {
    assert_eq!(
      parse_mmsi_from_html("<html>Vessel not found</html>"),
      Err(LookupError::MarkerNotFound)
    );
  }

  #[test]
  fn test_value_without_slash_is_malformed() {
    let page = r#"<td>IMO / MMSI</td><td class="v3">9321483</td>"#;
    assert!(matches!(
      parse_mmsi_from_html(page),
      Err(LookupError::MalformedField(_))
    ));
  }

  #[test]
  fn test_placeholder_mmsi_is_rejected() {
    let page = r#"<td>IMO / MMSI</td><td class="v3">9321483 / -</td>"#;
    assert_eq!(
      parse_mmsi_from_html(page),
      Err(LookupError::InvalidMmsi("-".to_string()))
    );
  }

  #[test]
  fn test_details_url_is_templated_by_imo() {
    let client = VesselFinderClient::new(&LookupClientConfig {
      base_url: "https://example.test/".to_string(),
      ..LookupClientConfig::default()
    })
    .unwrap();
    let imo = ImoNumber::parse("9321483").unwrap();
    assert_eq!(
      client.details_url(&imo),
      "https://example.test/vessels/details/9321483"
    );
  }
}
