use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::Parser;
use navigation::{
    NavigationConfig, SessionEvent,
    config::{self, ConfigError, DirectionsConfig},
    directions::{DirectionsProvider, GoogleDirectionsClient, load_route, route_geometry},
    error::AppError,
    geo::path_length_m,
    gpx_export::encode_trail_as_gpx,
    location::{LocationSource, ReplayLocationSource},
    models::Coordinate,
    session,
};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Replay a recorded walk through the navigation tracker"
)]
struct Args {
    /// Saved directions response (JSON) describing the route
    #[arg(long, conflicts_with = "destination", required_unless_present = "destination")]
    route: Option<PathBuf>,

    /// Ask the directions provider for a route to LAT,LON instead
    #[arg(long, value_parser = parse_coordinate)]
    destination: Option<Coordinate>,

    /// Recorded position fixes (JSON array)
    #[arg(long)]
    fixes: PathBuf,

    /// Write the walked trail as base64 GPX to this file
    #[arg(long)]
    gpx_out: Option<PathBuf>,

    /// Override the step advance threshold in meters
    #[arg(long, value_parser = parse_threshold)]
    advance_threshold_m: Option<f64>,

    /// Delay between replayed fixes in milliseconds
    #[arg(long, default_value_t = 0)]
    interval_ms: u64,
}

enum RouteSource<'a> {
    Saved(&'a Path),
    Fetch(Coordinate),
}

impl Args {
    fn route_source(&self) -> Result<RouteSource<'_>, ConfigError> {
        match (&self.route, self.destination) {
            (Some(path), _) => Ok(RouteSource::Saved(path)),
            (None, Some(destination)) => Ok(RouteSource::Fetch(destination)),
            (None, None) => Err(ConfigError::MissingRoute),
        }
    }
}

fn parse_threshold(raw: &str) -> Result<f64, ConfigError> {
    config::parse_distance("--advance-threshold-m", raw)
}

fn parse_coordinate(raw: &str) -> Result<Coordinate, String> {
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got {raw:?}"))?;
    let coord = Coordinate {
        lat: lat.trim().parse().map_err(|err| format!("latitude: {err}"))?,
        lon: lon.trim().parse().map_err(|err| format!("longitude: {err}"))?,
    };
    if coord.is_valid() {
        Ok(coord)
    } else {
        Err(format!("{raw:?} is not a valid coordinate"))
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "navigation=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = NavigationConfig::from_env_overriding(args.advance_threshold_m)?;

    let mut replay = ReplayLocationSource::from_file(&args.fixes)?;
    if args.interval_ms > 0 {
        replay = replay.with_interval(Duration::from_millis(args.interval_ms));
    }
    tracing::info!("replaying {} fixes from {:?}", replay.len(), args.fixes);
    let location = Arc::new(replay);

    let origin = location.fetch_position().await?.coord;

    let route = match args.route_source()? {
        RouteSource::Saved(path) => load_route(path)?,
        RouteSource::Fetch(destination) => {
            let client = GoogleDirectionsClient::new(DirectionsConfig::from_env()?);
            client.route(origin, destination).await?
        }
    };
    let geometry = route_geometry(&route);
    tracing::info!(
        "route: {} steps, {:.0}m by steps, {} geometry points over {:.0}m",
        route.steps.len(),
        route.total_distance_m(),
        geometry.len(),
        path_length_m(&geometry)
    );

    let handle = session::spawn(config, location);
    let mut events = handle.subscribe();
    let mut states = handle.watch();

    handle.start(route, origin).await?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SessionEvent::Arrived) => {
                    tracing::info!("trip complete");
                    if !config.stop_on_arrival {
                        break;
                    }
                }
                Ok(SessionEvent::Stopped) | Ok(SessionEvent::LocationEnded) => break,
                Ok(event) => tracing::info!("{:?}", event),
                Err(RecvError::Lagged(missed)) => tracing::warn!("missed {missed} session events"),
                Err(RecvError::Closed) => break,
            },
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                if let Some(step) = &state.current_step {
                    tracing::info!(
                        "step {}/{}: {} ({} to go)",
                        state.current_step_index + 1,
                        state.total_steps,
                        step.instruction,
                        state.distance_to_destination_text.as_deref().unwrap_or("?")
                    );
                }
            }
        }
    }

    let trail = handle.shutdown().await?;
    tracing::info!("walked trail has {} fixes", trail.len());

    if let Some(path) = args.gpx_out {
        std::fs::write(&path, encode_trail_as_gpx(&trail)?)?;
        tracing::info!("trail written to {:?}", path);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<Args, clap::Error> {
        let base = ["navigation", "--fixes", "walk.json", "--route", "route.json"];
        Args::try_parse_from(base.iter().chain(extra).copied())
    }

    #[test]
    fn threshold_flag_is_validated() {
        let args = parse(&["--advance-threshold-m", "12.5"]).unwrap();
        assert_eq!(args.advance_threshold_m, Some(12.5));

        for bad in ["-5", "0", "NaN", "inf", "far"] {
            assert!(parse(&["--advance-threshold-m", bad]).is_err(), "{bad}");
        }
    }

    #[test]
    fn saved_route_takes_the_file() {
        let args = parse(&[]).unwrap();
        assert!(matches!(
            args.route_source(),
            Ok(RouteSource::Saved(path)) if path == Path::new("route.json")
        ));
    }

    #[test]
    fn destination_selects_a_live_fetch() {
        let args = Args::try_parse_from([
            "navigation",
            "--fixes",
            "walk.json",
            "--destination",
            "2.814,101.762",
        ])
        .unwrap();
        assert!(matches!(
            args.route_source(),
            Ok(RouteSource::Fetch(Coordinate { lat, lon })) if lat == 2.814 && lon == 101.762
        ));
    }

    #[test]
    fn route_source_is_required() {
        assert!(Args::try_parse_from(["navigation", "--fixes", "walk.json"]).is_err());
    }
}
