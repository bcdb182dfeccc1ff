pub use shared::{
    Coordinate, Maneuver, NavigationState, PositionFix, Route, RouteStep, TextValue,
};
