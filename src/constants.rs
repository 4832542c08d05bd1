//! # Constants and type definitions for sightline
//!
//! This module centralizes the **geodetic constants**, **pipeline defaults**, and **common type
//! definitions** used throughout the `sightline` library.
//!
//! ## Overview
//!
//! - WGS84 ellipsoid parameters used by the projection and geodesic routines
//! - Default camera and ray-construction parameters (field of view, ray length,
//!   buffer distance)
//! - Core type aliases used across the crate
//! - Entity identifier aliases for the in-memory stores
//!
//! These definitions are used by all main modules, including the geodesy layer,
//! the ray builder, the matcher, and the consolidator.

// -------------------------------------------------------------------------------------------------
// Geodetic constants
// -------------------------------------------------------------------------------------------------

/// Earth equatorial radius in meters (GRS1980/WGS84)
pub const EARTH_MAJOR_AXIS: f64 = 6_378_137.0;

/// Latitude limit of the spherical Web Mercator projection (degrees).
///
/// Latitudes beyond this value project to unbounded northings and are rejected
/// by the projection routines.
pub const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

// -------------------------------------------------------------------------------------------------
// Pipeline defaults
// -------------------------------------------------------------------------------------------------

/// Default horizontal field of view of one side-mounted camera (degrees)
pub const DEFAULT_FOV_DEG: f64 = 90.0;

/// Default length of a detection ray (meters)
pub const DEFAULT_RAY_LENGTH_M: f64 = 20.0;

/// Default lateral buffer distance around a detection ray (meters)
pub const DEFAULT_BUFFER_DISTANCE_M: f64 = 15.0;

/// Default chord tolerance when sampling buffer arcs (meters).
///
/// Bounds the vertex count of generated buffer polygons: arc segments are
/// chosen so that the sagitta of each chord stays below this tolerance.
pub const DEFAULT_SIMPLIFY_TOLERANCE_M: f64 = 0.5;

/// Default prefix prepended to consolidated metadata keys
pub const DEFAULT_METADATA_PREFIX: &str = "sv_";

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Distance in meters
pub type Meter = f64;
/// Model confidence on [0, 1]
pub type Confidence = f64;

/// Index of an [`Image`](crate::images::Image) inside an [`ImageSet`](crate::images::ImageSet)
pub type ImageId = usize;
/// Index of a [`Building`](crate::buildings::Building) inside a
/// [`BuildingStore`](crate::buildings::BuildingStore)
pub type BuildingId = usize;
/// Index of a [`Detection`](crate::detections::Detection) inside a
/// [`DetectionSet`](crate::detections::DetectionSet)
pub type DetectionId = usize;

/// Integer class identifier emitted by the detector
pub type ClassId = i64;
