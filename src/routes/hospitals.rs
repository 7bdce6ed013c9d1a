//! Hospital map endpoint
//!
//! `GET /map/hospitals?lat=..&lon=..&radius=..` queries the Overpass API
//! for hospital nodes around a coordinate and returns them as a flat list.

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::auth::PolicyAction;
use crate::routes::{error_response, json_response, require, FullBody};
use crate::server::AppState;

#[derive(Debug, Serialize, PartialEq)]
pub struct Hospital {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    lat: f64,
    lon: f64,
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// Dispatch /map/* requests
pub async fn handle_hospitals_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    match (req.method(), path) {
        (&Method::GET, "/map/hospitals") => handle_nearby_hospitals(req, state).await,
        _ => error_response(StatusCode::NOT_FOUND, "Not found", None),
    }
}

/// GET /map/hospitals - hospitals within `radius` metres of (lat, lon)
async fn handle_nearby_hospitals(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<FullBody> {
    if let Err(resp) = require(&req, &state, PolicyAction::AuthenticatedOnly, None).await {
        return resp;
    }

    let query = req.uri().query().unwrap_or("");
    let params: HashMap<&str, &str> = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .collect();

    let lat: f64 = match params.get("lat").and_then(|v| v.parse().ok()) {
        Some(v) => v,
        None => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Query parameter 'lat' is required and must be a number",
                Some("BAD_QUERY"),
            )
        }
    };
    let lon: f64 = match params.get("lon").and_then(|v| v.parse().ok()) {
        Some(v) => v,
        None => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Query parameter 'lon' is required and must be a number",
                Some("BAD_QUERY"),
            )
        }
    };
    let radius: u32 = params
        .get("radius")
        .and_then(|v| v.parse().ok())
        .unwrap_or(state.args.hospital_radius_m);

    let overpass_query = build_overpass_query(lat, lon, radius);
    let url = format!(
        "{}?data={}",
        state.args.overpass_url,
        urlencoding::encode(&overpass_query)
    );

    let upstream = match state.http.get(&url).send().await {
        Ok(resp) => resp,
        Err(e) => {
            warn!("overpass unreachable: {}", e);
            return error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Map service unavailable",
                Some("UPSTREAM_UNAVAILABLE"),
            );
        }
    };

    if !upstream.status().is_success() {
        warn!(status = %upstream.status(), "overpass returned an error");
        return error_response(
            StatusCode::BAD_GATEWAY,
            "Map service returned an error",
            Some("UPSTREAM_ERROR"),
        );
    }

    let parsed: OverpassResponse = match upstream.json().await {
        Ok(p) => p,
        Err(e) => {
            warn!("overpass response unparseable: {}", e);
            return error_response(
                StatusCode::BAD_GATEWAY,
                "Map service returned an unreadable response",
                Some("UPSTREAM_ERROR"),
            );
        }
    };

    json_response(StatusCode::OK, &hospitals_from(parsed))
}

/// Overpass QL for hospital nodes within `radius` metres of the coordinate.
fn build_overpass_query(lat: f64, lon: f64, radius: u32) -> String {
    format!("[out:json];node[\"amenity\"=\"hospital\"](around:{radius},{lat},{lon});out;")
}

fn hospitals_from(resp: OverpassResponse) -> Vec<Hospital> {
    resp.elements
        .into_iter()
        .map(|e| Hospital {
            name: e
                .tags
                .get("name")
                .cloned()
                .unwrap_or_else(|| "Unknown Hospital".to_string()),
            lat: e.lat,
            lon: e.lon,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overpass_query_includes_coordinates_and_radius() {
        let q = build_overpass_query(6.9271, 79.8612, 5000);
        assert_eq!(
            q,
            "[out:json];node[\"amenity\"=\"hospital\"](around:5000,6.9271,79.8612);out;"
        );
    }

    #[test]
    fn parses_overpass_elements_into_hospitals() {
        let raw = r#"{
            "elements": [
                { "lat": 6.9, "lon": 79.8, "tags": { "name": "General Hospital" } },
                { "lat": 7.0, "lon": 79.9 }
            ]
        }"#;
        let parsed: OverpassResponse = serde_json::from_str(raw).unwrap();
        let hospitals = hospitals_from(parsed);
        assert_eq!(hospitals.len(), 2);
        assert_eq!(hospitals[0].name, "General Hospital");
        assert_eq!(hospitals[1].name, "Unknown Hospital");
        assert_eq!(hospitals[1].lat, 7.0);
    }

    #[test]
    fn empty_overpass_response_yields_no_hospitals() {
        let parsed: OverpassResponse = serde_json::from_str("{}").unwrap();
        assert!(hospitals_from(parsed).is_empty());
    }
}
