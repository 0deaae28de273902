//! Client for the daily-image rendering upstream.
//!
//! The upstream is an external HTTP service that renders "today's image" at
//! the frame's native resolution and returns it as an uncompressed BMP. The
//! orchestrator talks to it through a URL template that may carry a literal
//! `%DATE%` placeholder, e.g.
//!
//! ```text
//! http://render-host:8000/image/480x800?date=%DATE%
//! ```
//!
//! - [`resolve_daily_url`] substitutes the placeholder and, when the template
//!   carries no `date=` query parameter at all, appends one with the correct
//!   connector.
//! - [`DailyUpstream::fetch`] performs the bounded-timeout GET and accepts
//!   only an HTTP 200 with a non-empty body whose first two bytes are `BM`.
//!
//! Any other outcome is an [`UpstreamError`]; callers render it as HTTP 502.

#![deny(missing_docs)]

use std::time::Duration;

use chrono::NaiveDate;
use snafu::prelude::*;

/// First two bytes of every BMP file.
pub const BMP_MAGIC: &[u8; 2] = b"BM";

/// Minimum accepted fetch timeout. Shorter values are raised to this floor.
pub const MIN_FETCH_TIMEOUT: Duration = Duration::from_secs(1);

/// Errors produced while talking to the daily-image upstream.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum UpstreamError {
    /// The reqwest client could not be constructed.
    #[snafu(display("failed to build HTTP client: {source}"))]
    ClientBuild {
        /// Underlying reqwest error.
        source: reqwest::Error,
        /// Captured backtrace.
        backtrace: snafu::Backtrace,
    },

    /// The request failed at the transport layer (connect, timeout, ...).
    #[snafu(display("daily image request failed: {source}"))]
    Transport {
        /// Underlying reqwest error.
        source: reqwest::Error,
        /// Captured backtrace.
        backtrace: snafu::Backtrace,
    },

    /// The upstream answered with a non-200 status.
    #[snafu(display("daily image upstream returned HTTP {status}"))]
    BadStatus {
        /// The status code received.
        status: u16,
    },

    /// The upstream answered 200 with an empty body.
    #[snafu(display("daily image upstream returned an empty body"))]
    EmptyBody,

    /// The body does not start with the `BM` BMP signature.
    #[snafu(display("daily image upstream returned a non-BMP body"))]
    NotBmp,
}

/// Substitute `%DATE%` in `template` and make sure the result carries a
/// `date=` query parameter.
///
/// The substitution is a literal find-replace, not a format system. When the
/// resolved URL contains no `date=` anywhere, `date=<YYYY-MM-DD>` is appended
/// using `?` or `&` depending on whether a query string is already present.
pub fn resolve_daily_url(template: &str, date: NaiveDate) -> String {
    let date_text = date.format("%Y-%m-%d").to_string();
    let mut url = template.replace("%DATE%", &date_text);
    if !url.contains("date=") {
        let connector = if url.contains('?') { '&' } else { '?' };
        url = format!("{url}{connector}date={date_text}");
    }
    url
}

/// HTTP client for the daily-image upstream.
pub struct DailyUpstream {
    client: reqwest::Client,
    template: String,
}

impl DailyUpstream {
    /// Build a client for `template` with the given fetch timeout.
    ///
    /// The timeout is clamped to at least [`MIN_FETCH_TIMEOUT`].
    pub fn new(template: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout.max(MIN_FETCH_TIMEOUT))
            .build()
            .context(ClientBuildSnafu)?;
        Ok(Self {
            client,
            template: template.into(),
        })
    }

    /// The URL a device would fetch for `date`, without performing any I/O.
    pub fn image_url(&self, date: NaiveDate) -> String {
        resolve_daily_url(&self.template, date)
    }

    /// Fetch the rendered BMP for `date`.
    ///
    /// Success requires HTTP 200 and a non-empty body starting with `BM`.
    pub async fn fetch(&self, date: NaiveDate) -> Result<Vec<u8>, UpstreamError> {
        let url = self.image_url(date);
        tracing::debug!(%url, "fetching daily image");

        let response = self.client.get(&url).send().await.context(TransportSnafu)?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return BadStatusSnafu {
                status: status.as_u16(),
            }
            .fail();
        }

        let body = response.bytes().await.context(TransportSnafu)?;
        if body.is_empty() {
            return EmptyBodySnafu.fail();
        }
        if body.len() < BMP_MAGIC.len() || &body[..2] != BMP_MAGIC {
            return NotBmpSnafu.fail();
        }
        Ok(body.to_vec())
    }
}
