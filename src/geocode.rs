//! Place-search proxy. The browser cannot call the upstream API directly
//! (CORS and secret headers), so the server forwards queries and flattens
//! the result into coordinates the map can use.

use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::config::PlaceSearchConfig;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct PlaceHit {
    pub title: String,
    pub address: Option<String>,
    pub road_address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub category: Option<String>,
    pub phone: Option<String>,
}

#[async_trait]
pub trait PlaceSearch: Send + Sync {
    async fn search(&self, query: &str) -> anyhow::Result<Vec<PlaceHit>>;
}

pub struct HttpPlaceSearch {
    client: reqwest::Client,
    endpoint: String,
    client_id: String,
    client_secret: String,
}

impl HttpPlaceSearch {
    pub fn new(config: &PlaceSearchConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct LocalSearchResponse {
    #[serde(default)]
    items: Vec<LocalSearchItem>,
}

/// One upstream result. Coordinates arrive as WGS84 degrees scaled by 1e7
/// in string form.
#[derive(Debug, Deserialize)]
struct LocalSearchItem {
    title: String,
    #[serde(default)]
    address: Option<String>,
    #[serde(default, rename = "roadAddress")]
    road_address: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    telephone: Option<String>,
    mapx: String,
    mapy: String,
}

#[async_trait]
impl PlaceSearch for HttpPlaceSearch {
    async fn search(&self, query: &str) -> anyhow::Result<Vec<PlaceHit>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("query", query), ("display", "5"), ("sort", "random")])
            .header("X-Naver-Client-Id", self.client_id.as_str())
            .header("X-Naver-Client-Secret", self.client_secret.as_str())
            .send()
            .await?
            .error_for_status()?
            .json::<LocalSearchResponse>()
            .await?;

        Ok(response
            .items
            .into_iter()
            .filter_map(|item| {
                let latitude = item.mapy.parse::<f64>().ok()? / 1e7;
                let longitude = item.mapx.parse::<f64>().ok()? / 1e7;
                Some(PlaceHit {
                    title: strip_tags(&item.title),
                    address: item.address,
                    road_address: item.road_address,
                    latitude,
                    longitude,
                    category: item.category,
                    phone: item.telephone,
                })
            })
            .collect())
    }
}

// Upstream titles embed <b> highlight markup.
fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub items: Vec<PlaceHit>,
    pub source: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/search/places", get(search_places))
}

/// A failed or unconfigured upstream degrades to an empty result so the
/// client can fall back to other providers.
#[instrument(skip(state))]
pub async fn search_places(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let query = params.query.trim();
    if query.is_empty() {
        return Err(AppError::Validation("query is required".into()));
    }

    let Some(places) = state.places.clone() else {
        return Ok(Json(SearchResponse {
            items: Vec::new(),
            source: "disabled",
        }));
    };

    match places.search(query).await {
        Ok(items) if !items.is_empty() => Ok(Json(SearchResponse {
            items,
            source: "local",
        })),
        Ok(_) => Ok(Json(SearchResponse {
            items: Vec::new(),
            source: "local_empty",
        })),
        Err(e) => {
            warn!(error = %e, "place search upstream failed; returning empty result");
            Ok(Json(SearchResponse {
                items: Vec::new(),
                source: "local_empty",
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_tags_removes_highlight_markup() {
        assert_eq!(strip_tags("<b>Cafe</b> Seoul"), "Cafe Seoul");
        assert_eq!(strip_tags("plain"), "plain");
    }

    #[test]
    fn upstream_items_parse_scaled_coordinates() {
        let raw = r#"{"items":[{"title":"<b>Cafe</b>","address":"Seoul",
            "roadAddress":"1 Road","category":"cafe","telephone":"",
            "mapx":"1269700000","mapy":"375600000"}]}"#;
        let parsed: LocalSearchResponse = serde_json::from_str(raw).unwrap();
        let item = &parsed.items[0];
        assert_eq!(item.mapy.parse::<f64>().unwrap() / 1e7, 37.56);
        assert_eq!(item.mapx.parse::<f64>().unwrap() / 1e7, 126.97);
    }
}
