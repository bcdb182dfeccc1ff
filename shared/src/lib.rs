use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Finite and inside the WGS84 degree ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl From<Coordinate> for geo_types::Coord<f64> {
    fn from(coord: Coordinate) -> Self {
        geo_types::coord! { x: coord.lon, y: coord.lat }
    }
}

impl From<Coordinate> for geo_types::Point<f64> {
    fn from(coord: Coordinate) -> Self {
        geo_types::Point::new(coord.lon, coord.lat)
    }
}

/// Maneuver tag attached to a step by the directions provider.
///
/// Tags the provider invents later are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Maneuver {
    Straight,
    TurnLeft,
    TurnRight,
    TurnSlightLeft,
    TurnSlightRight,
    TurnSharpLeft,
    TurnSharpRight,
    UturnLeft,
    UturnRight,
    KeepLeft,
    KeepRight,
    RoundaboutLeft,
    RoundaboutRight,
    Merge,
    Other(String),
}

impl Maneuver {
    pub fn as_str(&self) -> &str {
        match self {
            Maneuver::Straight => "straight",
            Maneuver::TurnLeft => "turn-left",
            Maneuver::TurnRight => "turn-right",
            Maneuver::TurnSlightLeft => "turn-slight-left",
            Maneuver::TurnSlightRight => "turn-slight-right",
            Maneuver::TurnSharpLeft => "turn-sharp-left",
            Maneuver::TurnSharpRight => "turn-sharp-right",
            Maneuver::UturnLeft => "uturn-left",
            Maneuver::UturnRight => "uturn-right",
            Maneuver::KeepLeft => "keep-left",
            Maneuver::KeepRight => "keep-right",
            Maneuver::RoundaboutLeft => "roundabout-left",
            Maneuver::RoundaboutRight => "roundabout-right",
            Maneuver::Merge => "merge",
            Maneuver::Other(tag) => tag,
        }
    }
}

impl From<String> for Maneuver {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "straight" => Maneuver::Straight,
            "turn-left" => Maneuver::TurnLeft,
            "turn-right" => Maneuver::TurnRight,
            "turn-slight-left" => Maneuver::TurnSlightLeft,
            "turn-slight-right" => Maneuver::TurnSlightRight,
            "turn-sharp-left" => Maneuver::TurnSharpLeft,
            "turn-sharp-right" => Maneuver::TurnSharpRight,
            "uturn-left" => Maneuver::UturnLeft,
            "uturn-right" => Maneuver::UturnRight,
            "keep-left" => Maneuver::KeepLeft,
            "keep-right" => Maneuver::KeepRight,
            "roundabout-left" => Maneuver::RoundaboutLeft,
            "roundabout-right" => Maneuver::RoundaboutRight,
            "merge" => Maneuver::Merge,
            _ => Maneuver::Other(tag),
        }
    }
}

impl From<Maneuver> for String {
    fn from(maneuver: Maneuver) -> Self {
        match maneuver {
            Maneuver::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

/// Display text paired with its numeric value (meters or seconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextValue {
    pub text: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub start: Coordinate,
    pub end: Coordinate,
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maneuver: Option<Maneuver>,
    pub distance: TextValue,
    pub duration: TextValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub steps: Vec<RouteStep>,
    /// Encoded polyline of the whole path.
    #[serde(default)]
    pub polyline: String,
}

impl Route {
    pub fn destination(&self) -> Option<Coordinate> {
        self.steps.last().map(|step| step.end)
    }

    pub fn total_distance_m(&self) -> f64 {
        self.steps.iter().map(|step| step.distance.value).sum()
    }
}

/// A single reported device location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub coord: Coordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<Coordinate> for PositionFix {
    fn from(coord: Coordinate) -> Self {
        Self {
            coord,
            accuracy_m: None,
            timestamp: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationState {
    pub is_navigating: bool,
    pub current_step_index: usize,
    pub current_step: Option<RouteStep>,
    pub total_steps: usize,
    pub distance_to_destination_text: Option<String>,
    #[serde(default)]
    pub distance_to_destination_m: Option<f64>,
    /// Sum of the duration estimates of the current and later steps.
    #[serde(default)]
    pub remaining_duration_s: Option<f64>,
    #[serde(default)]
    pub last_position: Option<Coordinate>,
}

impl NavigationState {
    /// The state shown when no destination is set.
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn is_last_step(&self) -> bool {
        self.is_navigating && self.total_steps > 0 && self.current_step_index + 1 == self.total_steps
    }
}
