use std::{fs, future::Future, path::Path};

use serde::Deserialize;

use crate::{
    config::DirectionsConfig,
    models::{Coordinate, Maneuver, Route, RouteStep, TextValue},
    polyline,
};

#[derive(Debug, thiserror::Error)]
pub enum DirectionsError {
    #[error("directions request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to read directions file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid directions response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("directions provider answered {status}: {message}")]
    Status { status: String, message: String },
    #[error("directions response contains no route")]
    NoRoute,
    #[error("step {index} has an invalid coordinate")]
    InvalidStep { index: usize },
}

/// Source of routes between two points.
///
/// Implemented by [`GoogleDirectionsClient`]; tests and offline replays
/// plug in their own.
pub trait DirectionsProvider: Send + Sync {
    fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> impl Future<Output = Result<Route, DirectionsError>> + Send;
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<RouteDocument>,
}

#[derive(Debug, Deserialize)]
struct RouteDocument {
    legs: Vec<LegDocument>,
    #[serde(default)]
    overview_polyline: Option<PolylineDocument>,
}

#[derive(Debug, Deserialize)]
struct LegDocument {
    steps: Vec<StepDocument>,
}

#[derive(Debug, Deserialize)]
struct PolylineDocument {
    points: String,
}

#[derive(Debug, Deserialize)]
struct StepDocument {
    start_location: LatLng,
    end_location: LatLng,
    html_instructions: String,
    #[serde(default)]
    maneuver: Option<String>,
    distance: TextValue,
    duration: TextValue,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl From<LatLng> for Coordinate {
    fn from(value: LatLng) -> Self {
        Coordinate {
            lat: value.lat,
            lon: value.lng,
        }
    }
}

/// Decode a provider response body into the first route it offers.
///
/// This is the only place the raw document is read.
pub fn parse_route(body: &str) -> Result<Route, DirectionsError> {
    let response: DirectionsResponse = serde_json::from_str(body)?;

    match response.status.as_str() {
        "OK" => {}
        "ZERO_RESULTS" => return Err(DirectionsError::NoRoute),
        _ => {
            return Err(DirectionsError::Status {
                message: response.error_message.unwrap_or_default(),
                status: response.status,
            });
        }
    }

    let document = response
        .routes
        .into_iter()
        .next()
        .ok_or(DirectionsError::NoRoute)?;

    let steps = document
        .legs
        .into_iter()
        .flat_map(|leg| leg.steps)
        .enumerate()
        .map(|(index, step)| to_route_step(index, step))
        .collect::<Result<Vec<_>, _>>()?;

    if steps.is_empty() {
        return Err(DirectionsError::NoRoute);
    }

    Ok(Route {
        steps,
        polyline: document
            .overview_polyline
            .map(|overview| overview.points)
            .unwrap_or_default(),
    })
}

/// Load a route from a saved provider response.
pub fn load_route(path: impl AsRef<Path>) -> Result<Route, DirectionsError> {
    let body = fs::read_to_string(path)?;
    parse_route(&body)
}

/// Decoded path geometry, or nothing when the polyline is unusable.
///
/// Partial geometry is never returned.
pub fn route_geometry(route: &Route) -> Vec<Coordinate> {
    match polyline::decode(&route.polyline) {
        Ok(points) => points,
        Err(err) => {
            tracing::warn!("route polyline unusable, showing no geometry: {err}");
            Vec::new()
        }
    }
}

fn to_route_step(index: usize, step: StepDocument) -> Result<RouteStep, DirectionsError> {
    let start = Coordinate::from(step.start_location);
    let end = Coordinate::from(step.end_location);
    if !start.is_valid() || !end.is_valid() {
        return Err(DirectionsError::InvalidStep { index });
    }

    Ok(RouteStep {
        start,
        end,
        instruction: strip_markup(&step.html_instructions),
        maneuver: step.maneuver.filter(|tag| !tag.is_empty()).map(Maneuver::from),
        distance: step.distance,
        duration: step.duration,
    })
}

/// Instructions arrive as HTML fragments; keep the text only.
fn strip_markup(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                // Block tags separate sentences ("Turn left<div>Destination...</div>").
                if !text.is_empty() && !text.ends_with(' ') {
                    text.push(' ');
                }
            }
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// HTTP client for a Google Directions compatible endpoint.
///
/// Constructed explicitly and handed to whoever needs routes.
#[derive(Debug, Clone)]
pub struct GoogleDirectionsClient {
    http: reqwest::Client,
    config: DirectionsConfig,
}

impl GoogleDirectionsClient {
    pub fn new(config: DirectionsConfig) -> Self {
        Self::with_http_client(reqwest::Client::new(), config)
    }

    pub fn with_http_client(http: reqwest::Client, config: DirectionsConfig) -> Self {
        Self { http, config }
    }

    pub async fn fetch_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<Route, DirectionsError> {
        tracing::info!("requesting route {:?} -> {:?}", origin, destination);

        let body = self
            .http
            .get(&self.config.base_url)
            .query(&[
                ("origin", format!("{},{}", origin.lat, origin.lon)),
                ("destination", format!("{},{}", destination.lat, destination.lon)),
                ("mode", self.config.mode.clone()),
                ("key", self.config.api_key.clone()),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let route = parse_route(&body)?;
        tracing::info!("received route with {} steps", route.steps.len());
        Ok(route)
    }
}

impl DirectionsProvider for GoogleDirectionsClient {
    fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> impl Future<Output = Result<Route, DirectionsError>> + Send {
        self.fetch_route(origin, destination)
    }
}
