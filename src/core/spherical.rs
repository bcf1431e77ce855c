//! Geometry on the sphere: distances, headings and offsets in metres.

use crate::{
    core::{constants::EARTH_RADIUS, geo::LatLng},
    ClusterError, Result,
};

/// Great-circle distance between two coordinates in metres (haversine).
pub fn compute_distance_between(from: LatLng, to: LatLng) -> f64 {
    compute_angle_between(from, to) * EARTH_RADIUS
}

/// Central angle between two coordinates, in radians.
fn compute_angle_between(from: LatLng, to: LatLng) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let d_lat = lat2 - lat1;
    let d_lng = (to.lng - from.lng).to_radians();

    let h = hav(d_lat) + lat1.cos() * lat2.cos() * hav(d_lng);
    2.0 * h.sqrt().min(1.0).asin()
}

fn hav(x: f64) -> f64 {
    let sin_half = (x * 0.5).sin();
    sin_half * sin_half
}

/// Initial bearing from `from` to `to`, in degrees within `[-180, 180)`.
pub fn compute_heading(from: LatLng, to: LatLng) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let d_lng = (to.lng - from.lng).to_radians();

    let heading = (d_lng.sin() * lat2.cos())
        .atan2(lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lng.cos());
    LatLng::wrap_lng(heading.to_degrees())
}

/// Coordinate reached by travelling `distance` metres from `from` along
/// `heading` degrees clockwise from north.
pub fn compute_offset(from: LatLng, distance: f64, heading: f64) -> LatLng {
    let angle = distance / EARTH_RADIUS;
    let heading = heading.to_radians();
    let from_lat = from.lat.to_radians();

    let (sin_angle, cos_angle) = angle.sin_cos();
    let (sin_from_lat, cos_from_lat) = from_lat.sin_cos();

    let sin_lat = cos_angle * sin_from_lat + sin_angle * cos_from_lat * heading.cos();
    let d_lng = (sin_angle * cos_from_lat * heading.sin()).atan2(cos_angle - sin_from_lat * sin_lat);

    LatLng::new(sin_lat.asin().to_degrees(), from.lng + d_lng.to_degrees())
}

/// Total length of a polyline in metres. Paths with fewer than two points
/// have length zero.
pub fn compute_length(path: &[LatLng]) -> f64 {
    path.windows(2)
        .map(|pair| compute_distance_between(pair[0], pair[1]))
        .sum()
}

/// Checked access to a vertex of a path.
pub fn point_at(path: &[LatLng], index: usize) -> Result<LatLng> {
    path.get(index)
        .copied()
        .ok_or(ClusterError::IndexOutOfBounds {
            index,
            len: path.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_one_degree_on_equator() {
        let d = compute_distance_between(LatLng::new(0.0, 0.0), LatLng::new(0.0, 1.0));
        // 2πR / 360
        assert!((d - 111_194.9).abs() < 1.0);
    }

    #[test]
    fn test_offset_then_distance() {
        let origin = LatLng::new(39.9042, 116.4074);
        for heading in [0.0, 45.0, 90.0, 180.0, -135.0] {
            let target = compute_offset(origin, 10.0, heading);
            let d = compute_distance_between(origin, target);
            assert!((d - 10.0).abs() < 1e-6, "heading {heading}: {d}");
        }
    }

    #[test]
    fn test_heading_cardinal_directions() {
        let origin = LatLng::new(0.0, 0.0);
        assert!(compute_heading(origin, LatLng::new(1.0, 0.0)).abs() < 1e-9);
        assert!((compute_heading(origin, LatLng::new(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((compute_heading(origin, LatLng::new(0.0, -1.0)) + 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_length_of_path() {
        let path = [
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 1.0),
            LatLng::new(0.0, 2.0),
        ];
        let expected = 2.0 * compute_distance_between(path[0], path[1]);
        assert!((compute_length(&path) - expected).abs() < 1e-6);
        assert_eq!(compute_length(&path[..1]), 0.0);
    }

    #[test]
    fn test_point_at_out_of_range() {
        let path = [LatLng::new(1.0, 2.0)];
        assert_eq!(point_at(&path, 0).unwrap(), LatLng::new(1.0, 2.0));
        assert!(matches!(
            point_at(&path, 3),
            Err(ClusterError::IndexOutOfBounds { index: 3, len: 1 })
        ));
    }
}
