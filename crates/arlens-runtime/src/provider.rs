//! Point-of-interest providers.
//!
//! A [`PoiProvider`] turns a [`PoiQuery`] (centre, radius bucket, genre
//! keyword, result cap) into a fresh list of [`PointOfInterest`]. Two
//! implementations ship:
//!
//! - [`StaticPoiProvider`] – a JSON dataset held in memory. Used by the CLI
//!   replay and by tests.
//! - [`HttpPoiProvider`] – a gourmet-search web service reached over
//!   `reqwest`, keeping its query-string and JSON contract.
//!
//! Providers report failure through [`ProviderError`]; turning a failure
//! into "zero results" is the caller's job (see
//! [`FetchCoordinator`][crate::fetch::FetchCoordinator]).

use std::path::Path;

use arlens_perception::geodesy::distance_meters;
use arlens_types::{ArError, GeoPoint, PointOfInterest, SearchFilters};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::{debug, error};

/// Result-count cap sent with every remote query.
pub const DEFAULT_RESULT_COUNT: usize = 20;

/// Public endpoint of the gourmet-search service.
pub const DEFAULT_GOURMET_URL: &str = "https://webservice.recruit.co.jp/hotpepper/gourmet/v1/";

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The HTTP request failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The body was not the expected JSON shape.
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    /// The dataset file could not be read.
    #[error("Dataset I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The service answered with an application-level error.
    #[error("Service error: {0}")]
    Service(String),
}

impl From<ProviderError> for ArError {
    fn from(e: ProviderError) -> Self {
        ArError::Provider(e.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Query
// ─────────────────────────────────────────────────────────────────────────────

/// Radius bucket understood by the search service (codes 1–5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SearchRange(u8);

impl SearchRange {
    const BUCKETS_M: [f64; 5] = [300.0, 500.0, 1000.0, 2000.0, 3000.0];

    /// Smallest bucket that covers `radius_m`; anything beyond 2 km maps to
    /// the widest bucket.
    pub fn from_radius(radius_m: f64) -> Self {
        let code = Self::BUCKETS_M[..4]
            .iter()
            .position(|&b| radius_m <= b)
            .unwrap_or(4);
        SearchRange(code as u8 + 1)
    }

    pub fn code(self) -> u8 {
        self.0
    }

    /// The radius the service searches for this bucket.
    pub fn radius_m(self) -> f64 {
        Self::BUCKETS_M[usize::from(self.0.clamp(1, 5)) - 1]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoiQuery {
    pub center: GeoPoint,
    pub range: SearchRange,
    /// Genre keyword; `None` searches every genre.
    pub keyword: Option<String>,
    pub count: usize,
}

impl PoiQuery {
    /// Build the query for `filters` around `center`.
    pub fn new(center: GeoPoint, filters: &SearchFilters) -> Self {
        Self {
            center,
            range: SearchRange::from_radius(filters.radius_m),
            keyword: filters.genre.keyword().map(str::to_owned),
            count: DEFAULT_RESULT_COUNT,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A source of nearby points of interest.
#[async_trait]
pub trait PoiProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Fetch the points matching `query`. The returned list replaces any
    /// previous result wholesale.
    async fn fetch(&self, query: &PoiQuery) -> Result<Vec<PointOfInterest>, ProviderError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Static dataset
// ─────────────────────────────────────────────────────────────────────────────

/// One record of the bundled JSON dataset.
#[derive(Debug, Deserialize)]
struct ShopRecord {
    id: String,
    name: String,
    genre: String,
    #[serde(deserialize_with = "number_or_string")]
    lat: f64,
    #[serde(deserialize_with = "number_or_string")]
    lng: f64,
    #[serde(default)]
    address: String,
    #[serde(default)]
    thumbnail: String,
    #[serde(default)]
    rating: Option<f32>,
    #[serde(default)]
    is_open: Option<bool>,
    #[serde(default)]
    catch_copy: String,
    #[serde(default)]
    open_hours: String,
}

impl From<ShopRecord> for PointOfInterest {
    fn from(r: ShopRecord) -> Self {
        PointOfInterest {
            id: r.id,
            position: GeoPoint::new(r.lat, r.lng),
            name: r.name,
            genre: r.genre,
            rating: r.rating,
            thumbnail: r.thumbnail,
            address: r.address,
            is_open: r.is_open,
            catch_copy: r.catch_copy,
            open_hours: r.open_hours,
        }
    }
}

/// Serves a fixed dataset, narrowed to the query's radius bucket and
/// keyword. The local dataset is not capped by `count`.
#[derive(Debug, Clone, Default)]
pub struct StaticPoiProvider {
    points: Vec<PointOfInterest>,
}

impl StaticPoiProvider {
    pub fn new(points: Vec<PointOfInterest>) -> Self {
        Self { points }
    }

    /// Parse a JSON array of shop records.
    pub fn from_json(json: &str) -> Result<Self, ProviderError> {
        let records: Vec<ShopRecord> = serde_json::from_str(json)?;
        Ok(Self::new(records.into_iter().map(PointOfInterest::from).collect()))
    }

    /// Read and parse a JSON dataset from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let provider = Self::from_json(&json)?;
        debug!(path = %path.as_ref().display(), points = provider.len(), "dataset loaded");
        Ok(provider)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[async_trait]
impl PoiProvider for StaticPoiProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self, query: &PoiQuery) -> Result<Vec<PointOfInterest>, ProviderError> {
        let radius = query.range.radius_m();
        Ok(self
            .points
            .iter()
            .filter(|p| p.position.is_valid())
            .filter(|p| distance_meters(query.center, p.position) <= radius)
            .filter(|p| query.keyword.as_deref().is_none_or(|k| p.genre == k))
            .cloned()
            .collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gourmet-search web service
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GourmetResponse {
    results: GourmetResults,
}

#[derive(Debug, Deserialize)]
struct GourmetResults {
    #[serde(default)]
    shop: Vec<GourmetShop>,
    #[serde(default)]
    error: Option<Vec<GourmetError>>,
}

#[derive(Debug, Deserialize)]
struct GourmetError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct GourmetShop {
    id: String,
    name: String,
    #[serde(deserialize_with = "number_or_string")]
    lat: f64,
    #[serde(deserialize_with = "number_or_string")]
    lng: f64,
    #[serde(default)]
    address: String,
    #[serde(default)]
    genre: Named,
    #[serde(default)]
    photo: Photo,
    #[serde(default, rename = "catch")]
    catch_copy: String,
    #[serde(default)]
    open: String,
}

#[derive(Debug, Default, Deserialize)]
struct Named {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct Photo {
    #[serde(default)]
    pc: PhotoSizes,
}

#[derive(Debug, Default, Deserialize)]
struct PhotoSizes {
    #[serde(default)]
    l: String,
}

impl From<GourmetShop> for PointOfInterest {
    fn from(s: GourmetShop) -> Self {
        // The service publishes no ratings; any listed opening hours are
        // taken as "open".
        let is_open = Some(!s.open.trim().is_empty());
        PointOfInterest {
            id: s.id,
            position: GeoPoint::new(s.lat, s.lng),
            name: s.name,
            genre: s.genre.name,
            rating: None,
            thumbnail: s.photo.pc.l,
            address: s.address,
            is_open,
            catch_copy: s.catch_copy,
            open_hours: s.open,
        }
    }
}

/// Decode a gourmet-search JSON body.
pub fn parse_gourmet_response(body: &str) -> Result<Vec<PointOfInterest>, ProviderError> {
    let response: GourmetResponse = serde_json::from_str(body)?;
    if let Some(errors) = response.results.error {
        let message = errors
            .into_iter()
            .map(|e| e.message)
            .next()
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(ProviderError::Service(message));
    }
    Ok(response
        .results
        .shop
        .into_iter()
        .map(PointOfInterest::from)
        .collect())
}

/// Client for the gourmet-search web service.
#[derive(Clone)]
pub struct HttpPoiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for HttpPoiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPoiProvider")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl HttpPoiProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Query-string pairs for `query`, API key first.
    pub fn query_params(key: &str, query: &PoiQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("key", key.to_string()),
            ("lat", query.center.latitude.to_string()),
            ("lng", query.center.longitude.to_string()),
            ("range", query.range.code().to_string()),
            ("format", "json".to_string()),
            ("count", query.count.to_string()),
        ];
        if let Some(keyword) = &query.keyword {
            params.push(("keyword", keyword.clone()));
        }
        params
    }
}

#[async_trait]
impl PoiProvider for HttpPoiProvider {
    fn name(&self) -> &str {
        "gourmet-search"
    }

    async fn fetch(&self, query: &PoiQuery) -> Result<Vec<PointOfInterest>, ProviderError> {
        let Some(key) = self.api_key.as_deref() else {
            error!("gourmet-search API key is not configured; returning no results");
            return Ok(Vec::new());
        };

        let body = self
            .client
            .get(&self.base_url)
            .query(&Self::query_params(key, query))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let points = parse_gourmet_response(&body)?;
        debug!(count = points.len(), range = query.range.code(), "gourmet-search results");
        Ok(points)
    }
}

/// Accept a coordinate encoded either as a JSON number or a numeric string.
fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arlens_types::GenreFilter;

    const DATASET: &str = r#"[
        {"id": "a", "name": "Soba", "genre": "和食", "lat": 35.0009, "lng": 139.0,
         "address": "東京都 2F", "rating": 4.1, "is_open": true},
        {"id": "b", "name": "Bistro", "genre": "洋食", "lat": "35.004", "lng": "139.0"},
        {"id": "c", "name": "Far", "genre": "和食", "lat": 35.05, "lng": 139.0}
    ]"#;

    const ORIGIN: GeoPoint = GeoPoint {
        latitude: 35.0,
        longitude: 139.0,
    };

    #[test]
    fn search_range_buckets() {
        let codes: Vec<u8> = [0.0, 300.0, 301.0, 500.0, 1000.0, 2000.0, 2001.0, 3000.0]
            .into_iter()
            .map(|r| SearchRange::from_radius(r).code())
            .collect();
        assert_eq!(codes, vec![1, 1, 2, 2, 3, 4, 5, 5]);
        assert_eq!(SearchRange::from_radius(3000.0).radius_m(), 3000.0);
    }

    #[test]
    fn query_from_filters() {
        let all = PoiQuery::new(ORIGIN, &SearchFilters::default());
        assert_eq!(all.keyword, None);
        assert_eq!(all.range.code(), 3);
        assert_eq!(all.count, DEFAULT_RESULT_COUNT);

        let cafe = SearchFilters {
            genre: GenreFilter::Exact("カフェ".into()),
            radius_m: 300.0,
            ..SearchFilters::default()
        };
        let q = PoiQuery::new(ORIGIN, &cafe);
        assert_eq!(q.keyword.as_deref(), Some("カフェ"));
        assert_eq!(q.range.code(), 1);
    }

    #[tokio::test]
    async fn static_provider_filters_by_range_and_keyword() -> Result<(), Box<dyn std::error::Error>> {
        let provider = StaticPoiProvider::from_json(DATASET)?;
        assert_eq!(provider.len(), 3);

        let query = PoiQuery::new(ORIGIN, &SearchFilters::default());
        let ids: Vec<String> = provider.fetch(&query).await?.into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let washoku = PoiQuery {
            keyword: Some("和食".into()),
            ..query
        };
        let ids: Vec<String> = provider.fetch(&washoku).await?.into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["a"]);
        Ok(())
    }

    #[test]
    fn static_record_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let provider = StaticPoiProvider::from_json(DATASET)?;
        let b = &provider.points[1];
        assert_eq!(b.rating, None);
        assert_eq!(b.is_open, None);
        assert_eq!(b.address, "");
        assert!((b.position.latitude - 35.004).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn malformed_dataset_is_decode_error() {
        assert!(matches!(
            StaticPoiProvider::from_json("{not json"),
            Err(ProviderError::Decode(_))
        ));
    }

    #[test]
    fn missing_dataset_is_io_error() {
        assert!(matches!(
            StaticPoiProvider::from_path("/nonexistent/arlens/shops.json"),
            Err(ProviderError::Io(_))
        ));
    }

    #[test]
    fn gourmet_response_maps_fields() -> Result<(), Box<dyn std::error::Error>> {
        let body = r#"{"results": {"results_available": 1, "shop": [{
            "id": "J001", "name": "Ramen Ya", "lat": "35.6581", "lng": 139.7017,
            "address": "渋谷区道玄坂 3階", "genre": {"name": "ラーメン", "code": "G013"},
            "photo": {"pc": {"l": "https://img/l.jpg", "m": "https://img/m.jpg"}},
            "catch": "濃厚豚骨", "open": "月～日: 11:00～23:00"
        }, {
            "id": "J002", "name": "Closed", "lat": 35.0, "lng": 139.0, "open": ""
        }]}}"#;
        let points = parse_gourmet_response(body)?;
        assert_eq!(points.len(), 2);

        let ramen = &points[0];
        assert_eq!(ramen.genre, "ラーメン");
        assert_eq!(ramen.thumbnail, "https://img/l.jpg");
        assert_eq!(ramen.catch_copy, "濃厚豚骨");
        assert_eq!(ramen.rating, None);
        assert_eq!(ramen.is_open, Some(true));
        assert!((ramen.position.latitude - 35.6581).abs() < 1e-12);

        assert_eq!(points[1].is_open, Some(false));
        assert_eq!(points[1].genre, "");
        Ok(())
    }

    #[test]
    fn gourmet_service_error_is_reported() {
        let body = r#"{"results": {"error": [{"message": "Invalid API key", "code": 2000}]}}"#;
        match parse_gourmet_response(body) {
            Err(ProviderError::Service(msg)) => assert_eq!(msg, "Invalid API key"),
            other => panic!("expected service error, got {other:?}"),
        }
    }

    #[test]
    fn query_params_skip_keyword_for_all() {
        let query = PoiQuery::new(ORIGIN, &SearchFilters::default());
        let params = HttpPoiProvider::query_params("k", &query);
        let keys: Vec<&str> = params.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["key", "lat", "lng", "range", "format", "count"]);
        assert!(params.contains(&("count", "20".to_string())));
    }

    #[tokio::test]
    async fn http_provider_without_key_returns_empty() -> Result<(), Box<dyn std::error::Error>> {
        let provider = HttpPoiProvider::new("http://127.0.0.1:9/unused", Some("  ".into()));
        let query = PoiQuery::new(ORIGIN, &SearchFilters::default());
        assert!(provider.fetch(&query).await?.is_empty());
        assert!(format!("{provider:?}").contains("None"));
        Ok(())
    }

    #[test]
    fn debug_redacts_api_key() {
        let provider = HttpPoiProvider::new(DEFAULT_GOURMET_URL, Some("secret-key".into()));
        let dbg = format!("{provider:?}");
        assert!(!dbg.contains("secret-key"));
        assert!(dbg.contains("[REDACTED]"));
    }
}
