use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use geo_types::Point;
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};

use crate::error::AppError;
use crate::models::{Coordinate, PositionFix};

const CREATOR: &str = "campus_nav";

/// GPX document with one track holding `path`.
pub fn path_to_gpx(name: &str, path: &[Coordinate]) -> Result<Vec<u8>, AppError> {
    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(CREATOR.into()),
        ..Default::default()
    };
    let mut track = Track {
        name: Some(name.into()),
        ..Default::default()
    };

    let mut segment = TrackSegment::new();
    segment.points.extend(path.iter().copied().map(to_waypoint));
    track.segments.push(segment);
    gpx.tracks.push(track);

    let mut buffer = Vec::new();
    gpx::write(&gpx, &mut buffer)?;
    Ok(buffer)
}

/// Base64 GPX of the walked trail, ready to attach to a message.
pub fn encode_trail_as_gpx(trail: &[PositionFix]) -> Result<String, AppError> {
    let path: Vec<Coordinate> = trail.iter().map(|fix| fix.coord).collect();
    Ok(BASE64.encode(path_to_gpx("walked trail", &path)?))
}

fn to_waypoint(coord: Coordinate) -> Waypoint {
    Waypoint::new(Point::from(coord))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trail_round_trips_through_gpx() {
        let trail: Vec<PositionFix> = [
            Coordinate::new(2.8170, 101.7590),
            Coordinate::new(2.8160, 101.7600),
            Coordinate::new(2.8150, 101.7610),
        ]
        .into_iter()
        .map(PositionFix::from)
        .collect();

        let encoded = encode_trail_as_gpx(&trail).unwrap();
        let bytes = BASE64.decode(encoded).unwrap();
        let parsed = gpx::read(bytes.as_slice()).unwrap();

        let points = &parsed.tracks[0].segments[0].points;
        assert_eq!(points.len(), 3);
        let first = points[0].point();
        assert!((first.y() - 2.8170).abs() < 1e-9);
        assert!((first.x() - 101.7590).abs() < 1e-9);
    }

    #[test]
    fn empty_path_still_produces_a_document() {
        let bytes = path_to_gpx("route", &[]).unwrap();
        let parsed = gpx::read(bytes.as_slice()).unwrap();
        assert_eq!(parsed.tracks[0].name.as_deref(), Some("route"));
    }
}
