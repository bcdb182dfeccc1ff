use thiserror::Error;

use crate::{
    config::ConfigError, directions::DirectionsError, location::LocationError,
    session::SessionError, tracker::NavigationError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to build GPX document: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("directions error: {0}")]
    Directions(#[from] DirectionsError),
    #[error("location error: {0}")]
    Location(#[from] LocationError),
    #[error("navigation error: {0}")]
    Navigation(#[from] NavigationError),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
