pub mod config;
pub mod directions;
pub mod error;
pub mod geo;
pub mod gpx_export;
pub mod location;
pub mod models;
pub mod polyline;
pub mod session;
pub mod tracker;

pub use config::NavigationConfig;
pub use session::{SessionEvent, SessionHandle};
pub use tracker::{NavigationError, NavigationTracker};
