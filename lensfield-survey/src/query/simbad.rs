//! Cone queries against the SIMBAD TAP service.

use std::future::Future;
use std::time::Duration;

use lensfield_core::{Angle, SkyPoint};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::runner::RegionQuery;
use super::types::{CatalogObject, QueryError};
use crate::error::{Result, SurveyError};

pub const SIMBAD_TAP_URL: &str = "https://simbad.cds.unistra.fr/simbad/sim-tap/sync";

/// How to reach SIMBAD and what to ask it for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimbadConfig {
    /// TAP synchronous endpoint.
    pub endpoint: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// `TOP` clause of the query; `None` returns every row.
    pub row_limit: Option<u32>,
    /// Column of `basic` holding the object-type label.
    pub type_column: String,
}

impl Default for SimbadConfig {
    fn default() -> Self {
        Self {
            endpoint: SIMBAD_TAP_URL.to_string(),
            timeout_secs: 120,
            user_agent: format!("lensfield/{}", env!("CARGO_PKG_VERSION")),
            row_limit: Some(10_000),
            type_column: "otype_txt".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TapResponse {
    metadata: Vec<TapColumn>,
    data: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct TapColumn {
    name: String,
}

/// Positions of the four selected columns within a result row.
struct RowLayout {
    id: usize,
    otype: usize,
    ra: usize,
    dec: usize,
}

impl RowLayout {
    fn from_metadata(columns: &[TapColumn], type_column: &str) -> std::result::Result<Self, QueryError> {
        let find = |name: &str| {
            columns
                .iter()
                .position(|c| c.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| QueryError::permanent(format!("response has no '{name}' column")))
        };
        Ok(Self {
            id: find("main_id")?,
            otype: find(type_column)?,
            ra: find("ra")?,
            dec: find("dec")?,
        })
    }
}

pub struct SimbadClient {
    client: reqwest::Client,
    config: SimbadConfig,
}

impl SimbadClient {
    pub fn new(config: SimbadConfig) -> Result<Self> {
        if !is_identifier(&config.type_column) {
            return Err(SurveyError::Config(format!(
                "invalid SIMBAD type column '{}'",
                config.type_column
            )));
        }
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &SimbadConfig {
        &self.config
    }

    /// ADQL for every `basic` row within `radius` of `center`.
    pub fn cone_adql(&self, center: SkyPoint, radius: Angle) -> String {
        let top = self
            .config
            .row_limit
            .map(|n| format!("TOP {n} "))
            .unwrap_or_default();
        format!(
            "SELECT {top}main_id, {otype}, ra, dec FROM basic \
             WHERE CONTAINS(POINT('ICRS', ra, dec), CIRCLE('ICRS', {ra:.8}, {dec:.8}, {r:.8})) = 1",
            otype = self.config.type_column,
            ra = center.ra_deg(),
            dec = center.dec_deg(),
            r = radius.degrees(),
        )
    }

    pub async fn cone_search(
        &self,
        center: SkyPoint,
        radius: Angle,
    ) -> std::result::Result<Vec<CatalogObject>, QueryError> {
        let adql = self.cone_adql(center, radius);
        debug!(%center, radius_arcmin = radius.arcminutes(), "SIMBAD cone search");

        let response = self
            .client
            .post(&self.config.endpoint)
            .form(&[
                ("REQUEST", "doQuery"),
                ("LANG", "ADQL"),
                ("FORMAT", "json"),
                ("QUERY", adql.as_str()),
            ])
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let body = response.text().await.map_err(classify_transport)?;

        if !status.is_success() {
            let detail = snippet(&body);
            let message = format!("SIMBAD returned HTTP {status}: {detail}");
            return Err(if is_transient_status(status) {
                QueryError::Transient(message)
            } else {
                QueryError::Permanent(message)
            });
        }

        parse_rows(&body, &self.config.type_column)
    }
}

impl RegionQuery for SimbadClient {
    fn query_region(
        &self,
        center: SkyPoint,
        radius: Angle,
    ) -> impl Future<Output = std::result::Result<Vec<CatalogObject>, QueryError>> + Send {
        self.cone_search(center, radius)
    }
}

fn parse_rows(body: &str, type_column: &str) -> std::result::Result<Vec<CatalogObject>, QueryError> {
    let response: TapResponse = serde_json::from_str(body)
        .map_err(|e| QueryError::permanent(format!("unreadable SIMBAD response: {e}")))?;
    let layout = RowLayout::from_metadata(&response.metadata, type_column)?;

    let mut objects = Vec::with_capacity(response.data.len());
    for row in &response.data {
        let (Some(ra), Some(dec)) = (number(row, layout.ra), number(row, layout.dec)) else {
            continue;
        };
        let Ok(position) = SkyPoint::new(ra, dec) else {
            debug!(ra, dec, "skipping row with invalid position");
            continue;
        };
        objects.push(CatalogObject::new(
            text(row, layout.id),
            text(row, layout.otype),
            position,
        ));
    }
    Ok(objects)
}

fn number(row: &[Value], index: usize) -> Option<f64> {
    row.get(index).and_then(Value::as_f64)
}

fn text(row: &[Value], index: usize) -> String {
    match row.get(index) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn classify_transport(err: reqwest::Error) -> QueryError {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        QueryError::transient(err.to_string())
    } else {
        QueryError::permanent(err.to_string())
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(200) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
