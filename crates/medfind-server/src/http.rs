//! HTTP surface.
//!
//! | route | answers |
//! |---|---|
//! | `GET /search?query=&lat=&lng=` | tiered resolution; 404 when every tier is empty |
//! | `GET /suggest?query=` | alternatives only, never 404 |
//! | `GET /pharmacy/search?medicine=&lat=&lng=` | exact-name stock lookup |
//! | `GET /health` | liveness, whether the catalog has loaded, catalog and cache sizes |
//!
//! Bad input is a 400 with `{"message": ...}`. Upstream failures degrade into
//! empty tiers inside the resolver, so nothing here returns a 5xx.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use medfind_core::models::{
    GeoPoint, InventoryMatch, Pharmacy, Resolution, ResolutionResult, Suggestion, Tier,
};
use medfind_core::resolver::{Resolver, ResolverError};

pub const ALTERNATIVES_MESSAGE: &str =
    "Medicine not found nearby. Here are some AI-based alternatives:";

pub const NOT_FOUND_MESSAGE: &str = "No nearby pharmacies have this medicine, and AI couldn't find any alternatives. Try another name or spelling.";

/// API errors.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
}

impl From<ResolverError> for ApiError {
    fn from(e: ResolverError) -> Self {
        match e {
            ResolverError::InvalidInput(msg) => ApiError::BadRequest(msg),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        debug!(status = status.as_u16(), error = %self, "Rejected request");
        (
            status,
            Json(ErrorBody {
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Resolver,
}

impl AppState {
    pub fn new(resolver: Resolver) -> Self {
        Self { resolver }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/search", get(search))
        .route("/suggest", get(suggest))
        .route("/pharmacy/search", get(pharmacy_search))
        .route("/health", get(health))
        .with_state(state)
}

// Coordinates arrive as strings so a non-numeric value is our 400, not a
// rejection from the extractor.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub lat: Option<String>,
    pub lng: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SuggestParams {
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PharmacySearchParams {
    pub medicine: Option<String>,
    pub lat: Option<String>,
    pub lng: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub found: bool,
    pub tier: Tier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<InventoryMatch>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<Suggestion>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SearchResponse {
    /// Response body and status for a resolution.
    pub fn from_resolution(resolution: Resolution) -> (StatusCode, Self) {
        let tier = resolution.tier();
        match resolution.result {
            ResolutionResult::Inventory { matches } => (
                StatusCode::OK,
                Self {
                    found: true,
                    tier,
                    results: Some(matches),
                    suggestions: None,
                    message: None,
                },
            ),
            ResolutionResult::Fuzzy { matches } | ResolutionResult::Semantic { matches } => (
                StatusCode::OK,
                Self {
                    found: false,
                    tier,
                    results: None,
                    suggestions: Some(matches),
                    message: Some(ALTERNATIVES_MESSAGE.to_string()),
                },
            ),
            ResolutionResult::None => (
                StatusCode::NOT_FOUND,
                Self {
                    found: false,
                    tier,
                    results: None,
                    suggestions: Some(Vec::new()),
                    message: Some(NOT_FOUND_MESSAGE.to_string()),
                },
            ),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuggestResponse {
    pub tier: Tier,
    pub suggestions: Vec<Suggestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One pharmacy in an exact-name stock lookup.
#[derive(Debug, Serialize, Deserialize)]
pub struct PharmacyStock {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub location: GeoPoint,
    pub stock: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl PharmacyStock {
    fn from_match(m: InventoryMatch) -> Self {
        let stock = m.items.iter().map(|i| i.quantity).sum();
        let Pharmacy {
            name,
            address,
            phone,
            location,
            ..
        } = m.pharmacy;
        Self {
            name,
            address,
            phone,
            location,
            stock,
            distance: m.distance,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PharmacySearchResponse {
    pub pharmacies: Vec<PharmacyStock>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub ok: bool,
    pub catalog_ready: bool,
    pub medicines: usize,
    pub cached_embeddings: usize,
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<(StatusCode, Json<SearchResponse>)> {
    let query = required(params.query.as_deref(), "query")?;
    let center = parse_center(params.lat.as_deref(), params.lng.as_deref())?;

    let resolution = state.resolver.resolve(query, center).await?;
    let (status, body) = SearchResponse::from_resolution(resolution);
    Ok((status, Json(body)))
}

async fn suggest(
    State(state): State<AppState>,
    Query(params): Query<SuggestParams>,
) -> ApiResult<Json<SuggestResponse>> {
    let query = required(params.query.as_deref(), "query")?;

    let resolution = state.resolver.suggest(query).await?;
    let tier = resolution.tier();
    let suggestions = resolution.result.suggestions().to_vec();
    let message = suggestions
        .is_empty()
        .then(|| format!("No medicine found for \"{}\".", resolution.query));

    Ok(Json(SuggestResponse {
        tier,
        suggestions,
        message,
    }))
}

async fn pharmacy_search(
    State(state): State<AppState>,
    Query(params): Query<PharmacySearchParams>,
) -> ApiResult<Json<PharmacySearchResponse>> {
    let medicine = required(params.medicine.as_deref(), "medicine")?;
    let center = parse_center(params.lat.as_deref(), params.lng.as_deref())?;

    let matches = state.resolver.pharmacy_stock(medicine, center).await?;
    Ok(Json(PharmacySearchResponse {
        pharmacies: matches.into_iter().map(PharmacyStock::from_match).collect(),
    }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        catalog_ready: state.resolver.index().is_ready(),
        medicines: state.resolver.index().snapshot().catalog().len(),
        cached_embeddings: state.resolver.embeddings().len(),
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(value: Option<&'a str>, name: &str) -> ApiResult<&'a str> {
    non_blank(value).ok_or_else(|| ApiError::BadRequest(format!("{} is required", name)))
}

/// A center only when both coordinates are given; one alone is ignored.
fn parse_center(lat: Option<&str>, lng: Option<&str>) -> ApiResult<Option<GeoPoint>> {
    let (Some(lat), Some(lng)) = (non_blank(lat), non_blank(lng)) else {
        return Ok(None);
    };

    let number = |name: &str, v: &str| {
        v.parse::<f64>()
            .map_err(|_| ApiError::BadRequest(format!("{} must be a number, got {:?}", name, v)))
    };
    Ok(Some(GeoPoint::new(number("lat", lat)?, number("lng", lng)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use medfind_core::models::MedicineRecord;

    #[test]
    fn test_parse_center() {
        let center = parse_center(Some("28.6139"), Some(" 77.2090 ")).unwrap().unwrap();
        assert_eq!(center, GeoPoint::new(28.6139, 77.2090));

        assert!(parse_center(Some("28.6"), None).unwrap().is_none());
        assert!(parse_center(None, Some("77.2")).unwrap().is_none());
        assert!(parse_center(Some(""), Some("77.2")).unwrap().is_none());
        assert!(matches!(
            parse_center(Some("north"), Some("77.2")),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_required() {
        assert_eq!(required(Some(" dolo "), "query").unwrap(), "dolo");
        assert!(required(Some("  "), "query").is_err());
        assert!(required(None, "query").is_err());
    }

    #[test]
    fn test_status_per_tier() {
        let resolution = |result| Resolution {
            query: "q".into(),
            result,
            visited: Vec::new(),
        };

        let (status, body) = SearchResponse::from_resolution(resolution(ResolutionResult::None));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.suggestions.as_deref(), Some(&[][..]));
        assert_eq!(body.message.as_deref(), Some(NOT_FOUND_MESSAGE));

        let fuzzy = ResolutionResult::Fuzzy {
            matches: vec![Suggestion::from_record(&MedicineRecord::new("paracetamol"))],
        };
        let (status, body) = SearchResponse::from_resolution(resolution(fuzzy));
        assert_eq!(status, StatusCode::OK);
        assert!(!body.found);
        assert_eq!(body.tier, Tier::Fuzzy);
        assert!(body.results.is_none());

        let inventory = ResolutionResult::Inventory { matches: Vec::new() };
        let (status, body) = SearchResponse::from_resolution(resolution(inventory));
        assert_eq!(status, StatusCode::OK);
        assert!(body.found);
    }
}
