//! # Geodetic transform utilities
//!
//! This module provides the coordinate machinery used by the ray builder and the
//! matcher:
//!
//! 1. **Projection**: closed-form spherical Web Mercator (EPSG:4326 ↔ EPSG:3857),
//!    so buffer distances are expressed and validated in meters rather than degrees.
//! 2. **Geodesics**: ellipsoidal forward/inverse problems on WGS84 via
//!    [`geo::Geodesic`], avoiding the flat-earth error growth at higher latitudes.
//! 3. **Buffers**: circle and capsule polygons built in projected space with a
//!    tolerance-bounded vertex count, reprojected to geographic coordinates.
//!
//! All entry points validate their coordinates; an out-of-range longitude or
//! latitude is a record-level error ([`SightlineError::InvalidCoordinate`]) that
//! callers skip and report rather than letting it abort a batch.
//!
//! ## See also
//! ------------
//! * [`crate::ray`] – Consumer of [`generate_ray`] and [`ray_buffer`].
//! * [`crate::matcher`] – Consumer of [`projected_distance`].

use geo::{Bearing, Destination, Distance, Geodesic};
use geo::{BoundingRect, Coord, LineString, Point, Polygon};

use crate::constants::{Degree, Meter, EARTH_MAJOR_AXIS, MERCATOR_MAX_LAT};
use crate::sightline_errors::SightlineError;

/// Minimum number of segments used to sample a buffer arc, whatever the tolerance.
const MIN_ARC_SEGMENTS: usize = 8;

/// Check that a lon/lat pair is a finite, in-range WGS84 coordinate.
///
/// Arguments
/// -----------------
/// * `lon`: longitude in degrees, must lie on [-180, 180].
/// * `lat`: latitude in degrees, must lie on [-90, 90].
///
/// Return
/// ----------
/// * `Ok(())` or [`SightlineError::InvalidCoordinate`].
pub fn validate_lonlat(lon: Degree, lat: Degree) -> Result<(), SightlineError> {
    if !lon.is_finite() || !lat.is_finite() || !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat)
    {
        return Err(SightlineError::InvalidCoordinate(lon, lat));
    }
    Ok(())
}

/// Wrap an angle into [0, 360) degrees.
pub fn normalize_heading(angle: Degree) -> Degree {
    angle.rem_euclid(360.0)
}

/// Project a WGS84 coordinate to spherical Web Mercator meters.
///
/// Round-trips with [`unproject_point`] to well below 1e-6 degrees for
/// urban-scale coordinates.
///
/// Arguments
/// -----------------
/// * `lon`: longitude in degrees.
/// * `lat`: latitude in degrees, `|lat|` must not exceed the Mercator limit.
///
/// Return
/// ----------
/// * Projected `(x, y)` in meters, or an error for out-of-range input.
pub fn project_point(lon: Degree, lat: Degree) -> Result<(Meter, Meter), SightlineError> {
    validate_lonlat(lon, lat)?;
    if lat.abs() > MERCATOR_MAX_LAT {
        return Err(SightlineError::LatitudeOutsideProjection(lat));
    }

    let x = EARTH_MAJOR_AXIS * lon.to_radians();
    let y = EARTH_MAJOR_AXIS * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    Ok((x, y))
}

/// Inverse of [`project_point`]: Web Mercator meters back to WGS84 degrees.
pub fn unproject_point(x: Meter, y: Meter) -> (Degree, Degree) {
    let lon = (x / EARTH_MAJOR_AXIS).to_degrees();
    let lat = (2.0 * (y / EARTH_MAJOR_AXIS).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    (lon, lat)
}

/// Solve the forward geodesic problem on the WGS84 ellipsoid.
///
/// Arguments
/// -----------------
/// * `lon`, `lat`: start point in degrees.
/// * `azimuth`: compass bearing in degrees, clockwise from north.
/// * `distance`: great-circle-consistent distance in meters.
///
/// Return
/// ----------
/// * Destination `(lon, lat)` in degrees.
pub fn forward_geodesic(
    lon: Degree,
    lat: Degree,
    azimuth: Degree,
    distance: Meter,
) -> Result<(Degree, Degree), SightlineError> {
    validate_lonlat(lon, lat)?;
    let dest = Geodesic.destination(Point::new(lon, lat), normalize_heading(azimuth), distance);
    Ok((dest.x(), dest.y()))
}

/// Solve the inverse geodesic problem: bearing and distance from one point to another.
///
/// Return
/// ----------
/// * `(azimuth, distance)` with the azimuth wrapped into [0, 360) degrees and the
///   distance in meters.
pub fn inverse_geodesic(
    lon1: Degree,
    lat1: Degree,
    lon2: Degree,
    lat2: Degree,
) -> Result<(Degree, Meter), SightlineError> {
    validate_lonlat(lon1, lat1)?;
    validate_lonlat(lon2, lat2)?;
    let a = Point::new(lon1, lat1);
    let b = Point::new(lon2, lat2);
    Ok((normalize_heading(Geodesic.bearing(a, b)), Geodesic.distance(a, b)))
}

/// Planar Euclidean distance between two WGS84 points, measured in projected meters.
///
/// Raw lon/lat degree distance is anisotropic; both points are projected to
/// Web Mercator before taking the L2 norm, matching how the matcher compares
/// candidate centroids.
pub fn projected_distance(a: &Point<f64>, b: &Point<f64>) -> Result<Meter, SightlineError> {
    let (ax, ay) = project_point(a.x(), a.y())?;
    let (bx, by) = project_point(b.x(), b.y())?;
    Ok((bx - ax).hypot(by - ay))
}

/// Build a two-point ray linestring from a start point along a compass bearing.
///
/// Arguments
/// -----------------
/// * `lon`, `lat`: origin of the ray (the image capture position).
/// * `azimuth`: detection bearing in degrees.
/// * `distance`: ray length in meters.
///
/// Return
/// ----------
/// * A [`LineString`] whose first vertex is exactly the origin.
pub fn generate_ray(
    lon: Degree,
    lat: Degree,
    azimuth: Degree,
    distance: Meter,
) -> Result<LineString<f64>, SightlineError> {
    let (lon_end, lat_end) = forward_geodesic(lon, lat, azimuth, distance)?;
    Ok(LineString::from(vec![(lon, lat), (lon_end, lat_end)]))
}

/// Number of segments needed so that each arc chord's sagitta stays below `tolerance`.
fn arc_segments(radius: Meter, tolerance: Meter) -> usize {
    if tolerance <= 0.0 || tolerance >= radius {
        return MIN_ARC_SEGMENTS;
    }
    let theta = 2.0 * (1.0 - tolerance / radius).acos();
    let n = (std::f64::consts::TAU / theta).ceil() as usize;
    n.max(MIN_ARC_SEGMENTS)
}

/// Reproject a projected ring back to degrees and close it into a polygon.
///
/// Falls back to the ring's bounding rectangle if the reprojected ring is
/// degenerate (too few vertices or non-finite coordinates), so the output is
/// never self-intersecting.
fn ring_to_polygon(ring: Vec<(Meter, Meter)>, context: &str) -> Result<Polygon<f64>, SightlineError> {
    let coords: Vec<Coord<f64>> = ring
        .into_iter()
        .map(|(x, y)| {
            let (lon, lat) = unproject_point(x, y);
            Coord { x: lon, y: lat }
        })
        .collect();

    if coords.len() < 4 || coords.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        let finite: Vec<Coord<f64>> = coords
            .into_iter()
            .filter(|c| c.x.is_finite() && c.y.is_finite())
            .collect();
        let rect = LineString::from(finite)
            .bounding_rect()
            .ok_or_else(|| SightlineError::EmptyGeometry(context.to_string()))?;
        return Ok(rect.to_polygon());
    }

    Ok(Polygon::new(LineString::from(coords), vec![]))
}

/// Build a circular buffer polygon around a WGS84 point.
///
/// The circle is constructed in projected space with a tolerance-bounded number
/// of segments and reprojected to degrees. The result is convex by construction.
///
/// Arguments
/// -----------------
/// * `lon`, `lat`: buffer center in degrees.
/// * `distance`: buffer radius in meters.
/// * `tolerance`: maximum chord sagitta in meters, bounds the vertex count.
pub fn point_buffer(
    lon: Degree,
    lat: Degree,
    distance: Meter,
    tolerance: Meter,
) -> Result<Polygon<f64>, SightlineError> {
    let (cx, cy) = project_point(lon, lat)?;
    let n = arc_segments(distance, tolerance);

    let mut ring = Vec::with_capacity(n + 1);
    for i in 0..=n {
        let theta = std::f64::consts::TAU * (i as f64) / (n as f64);
        ring.push((cx + distance * theta.cos(), cy + distance * theta.sin()));
    }
    ring_to_polygon(ring, "point buffer")
}

/// Build a capsule buffer polygon around a two-point WGS84 ray.
///
/// The ray is projected to Web Mercator, expanded laterally by `distance` with
/// semicircular end caps, and reprojected. A zero-length ray degrades to a
/// circle around its origin.
///
/// Arguments
/// -----------------
/// * `ray`: the detection ray linestring (first and last vertex are used).
/// * `distance`: lateral buffer distance in meters.
/// * `tolerance`: maximum chord sagitta in meters, bounds the vertex count.
pub fn ray_buffer(
    ray: &LineString<f64>,
    distance: Meter,
    tolerance: Meter,
) -> Result<Polygon<f64>, SightlineError> {
    let coords = &ray.0;
    if coords.is_empty() {
        return Err(SightlineError::EmptyGeometry("ray buffer".to_string()));
    }
    let start = coords[0];
    let end = coords[coords.len() - 1];

    let (x0, y0) = project_point(start.x, start.y)?;
    let (x1, y1) = project_point(end.x, end.y)?;

    let (dx, dy) = (x1 - x0, y1 - y0);
    let len = dx.hypot(dy);
    if len < f64::EPSILON {
        return point_buffer(start.x, start.y, distance, tolerance);
    }

    // Unit direction and left-hand normal of the projected ray
    let (ux, uy) = (dx / len, dy / len);
    let (nx, ny) = (-uy, ux);

    let n = arc_segments(distance, tolerance);
    let cap = n / 2;
    let phi0 = ny.atan2(nx);

    let mut ring = Vec::with_capacity(2 * cap + 4);
    ring.push((x0 + nx * distance, y0 + ny * distance));
    ring.push((x1 + nx * distance, y1 + ny * distance));
    // Cap around the far endpoint, sweeping from +normal through the ray direction
    for i in 1..cap {
        let phi = phi0 - std::f64::consts::PI * (i as f64) / (cap as f64);
        ring.push((x1 + distance * phi.cos(), y1 + distance * phi.sin()));
    }
    ring.push((x1 - nx * distance, y1 - ny * distance));
    ring.push((x0 - nx * distance, y0 - ny * distance));
    // Cap around the origin, sweeping back to the start vertex
    for i in 1..cap {
        let phi = phi0 + std::f64::consts::PI * (1.0 - (i as f64) / (cap as f64));
        ring.push((x0 + distance * phi.cos(), y0 + distance * phi.sin()));
    }
    ring.push(ring[0]);

    ring_to_polygon(ring, "ray buffer")
}

/// Axis-aligned bounding rectangle of a polygon, as a polygon.
///
/// Used to coarsen a capsule buffer into the rectangular search extent stored
/// on each detection.
pub fn bounding_box_polygon(polygon: &Polygon<f64>) -> Result<Polygon<f64>, SightlineError> {
    let rect = polygon
        .bounding_rect()
        .ok_or_else(|| SightlineError::EmptyGeometry("bounding box".to_string()))?;
    Ok(rect.to_polygon())
}
