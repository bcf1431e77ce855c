use std::f64::consts::PI;

use crate::{
    core::geo::{LatLng, Point},
    ClusterError, Result,
};

/// The integer zoom level a camera zoom falls into.
///
/// Non-finite zooms are rejected. Finite zooms beyond the `i32` range
/// saturate to `i32::MIN` or `i32::MAX`.
pub fn discrete_zoom(zoom: f64) -> Result<i32> {
    if !zoom.is_finite() {
        return Err(ClusterError::InvalidZoom(zoom));
    }
    Ok(zoom.floor() as i32)
}

/// Spherical Mercator projection onto a square world of configurable width.
///
/// With a world width of 1 every coordinate within the Web Mercator latitude
/// limit (about ±85.05°) maps into `[0,1]×[0,1]`, which is the space the
/// clustering quad-tree indexes. Nothing is clamped: higher latitudes land
/// outside the square and exactly ±90° produces non-finite `y` values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalMercatorProjection {
    world_width: f64,
}

impl SphericalMercatorProjection {
    pub fn new(world_width: f64) -> Self {
        Self { world_width }
    }

    /// Projection onto the unit square
    pub fn unit() -> Self {
        Self::new(1.0)
    }

    pub fn world_width(&self) -> f64 {
        self.world_width
    }

    pub fn to_point(&self, lat_lng: LatLng) -> Point {
        let x = lat_lng.lng / 360.0 + 0.5;
        let sin_y = lat_lng.lat.to_radians().sin();
        let y = 0.5 - ((1.0 + sin_y) / (1.0 - sin_y)).ln() / (4.0 * PI);

        Point::new(x * self.world_width, y * self.world_width)
    }

    /// Projects a possibly missing position, treating `None` as `(0, 0)`.
    pub fn to_point_or_origin(&self, lat_lng: Option<LatLng>) -> Point {
        self.to_point(lat_lng.unwrap_or_default())
    }

    pub fn to_lat_lng(&self, point: Point) -> LatLng {
        let x = point.x / self.world_width - 0.5;
        let lng = x * 360.0;

        let y = 0.5 - point.y / self.world_width;
        let lat = 90.0 - ((-y * 2.0 * PI).exp().atan() * 2.0).to_degrees();

        LatLng::new(lat, lng)
    }
}

impl Default for SphericalMercatorProjection {
    fn default() -> Self {
        Self::unit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_projects_to_center() {
        let projection = SphericalMercatorProjection::unit();
        let p = projection.to_point(LatLng::new(0.0, 0.0));
        assert!((p.x - 0.5).abs() < 1e-12);
        assert!((p.y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_missing_position_defaults_to_origin() {
        let projection = SphericalMercatorProjection::unit();
        assert_eq!(
            projection.to_point_or_origin(None),
            projection.to_point(LatLng::new(0.0, 0.0))
        );
    }

    #[test]
    fn test_north_is_up() {
        let projection = SphericalMercatorProjection::unit();
        let north = projection.to_point(LatLng::new(60.0, 0.0));
        let south = projection.to_point(LatLng::new(-60.0, 0.0));
        assert!(north.y < 0.5);
        assert!(south.y > 0.5);
        assert!((north.y + south.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_round_trip() {
        let projection = SphericalMercatorProjection::new(256.0);
        let samples = [
            LatLng::new(0.0, 0.0),
            LatLng::new(39.9042, 116.4074),
            LatLng::new(-33.8688, 151.2093),
            LatLng::new(85.0, -179.9),
            LatLng::new(-89.5, 179.9),
        ];
        for original in samples {
            let back = projection.to_lat_lng(projection.to_point(original));
            assert!((back.lat - original.lat).abs() < 1e-9, "{original:?} -> {back:?}");
            assert!((back.lng - original.lng).abs() < 1e-9, "{original:?} -> {back:?}");
        }
    }

    #[test]
    fn test_points_stay_in_world() {
        // Web Mercator latitude limit
        let projection = SphericalMercatorProjection::unit();
        for lat in [-85.05, -45.0, 0.0, 45.0, 85.05] {
            for lng in [-180.0, -90.0, 0.0, 90.0, 180.0] {
                let p = projection.to_point(LatLng::new(lat, lng));
                assert!((0.0..=1.0).contains(&p.x));
                assert!((0.0..=1.0).contains(&p.y));
            }
        }
    }

    #[test]
    fn test_discrete_zoom() {
        assert_eq!(discrete_zoom(10.7).unwrap(), 10);
        assert_eq!(discrete_zoom(-0.5).unwrap(), -1);
        assert_eq!(discrete_zoom(1e12).unwrap(), i32::MAX);
        assert_eq!(discrete_zoom(-1e12).unwrap(), i32::MIN);
        for zoom in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            assert!(matches!(discrete_zoom(zoom), Err(ClusterError::InvalidZoom(_))));
        }
    }
}
