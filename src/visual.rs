//! # Visual-extent calculation
//!
//! Derives the angular window visible to each side-mounted camera from the
//! vehicle heading, and maps a normalized horizontal position inside an image
//! to an absolute compass bearing.
//!
//! The left camera looks 90° counter-clockwise off the heading axis
//! (heading + 270°), the right camera 90° clockwise (heading + 90°). Each
//! window spans half the field of view on either side of its axis. All bounds
//! are wrapped into [0, 360); a window whose maximum is numerically smaller
//! than its minimum crosses the north seam and is unwrapped transparently by
//! [`interpolate`].

use std::collections::HashMap;

use crate::constants::{Degree, DEFAULT_FOV_DEG};
use crate::geodesy::normalize_heading;
use crate::sightline_errors::SightlineError;

/// Which side-mounted camera captured an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraSide {
    Left,
    Right,
}

/// Default camera-index-to-side mapping of the capture rig (cam 1 faces right,
/// cam 3 faces left).
pub fn default_camera_sides() -> HashMap<u8, CameraSide> {
    HashMap::from([(1, CameraSide::Right), (3, CameraSide::Left)])
}

/// Angular windows (compass degrees) visible to the left and right cameras.
///
/// # Fields
///
/// * `l_min`, `l_max` - Bounds of the left camera window, each in [0, 360)
/// * `r_min`, `r_max` - Bounds of the right camera window, each in [0, 360)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualExtents {
    pub l_min: Degree,
    pub l_max: Degree,
    pub r_min: Degree,
    pub r_max: Degree,
}

impl VisualExtents {
    /// Compute both camera windows from a vehicle heading.
    ///
    /// Arguments
    /// -----------------
    /// * `heading`: vehicle compass heading in degrees.
    /// * `fov`: horizontal field of view of one camera in degrees.
    ///
    /// Return
    /// ----------
    /// * The visual extents, every bound wrapped into [0, 360).
    pub fn from_heading(heading: Degree, fov: Degree) -> Self {
        let half_window = fov / 2.0;
        VisualExtents {
            l_min: normalize_heading(heading + 270.0 - half_window),
            l_max: normalize_heading(heading + 270.0 + half_window),
            r_min: normalize_heading(heading + 90.0 - half_window),
            r_max: normalize_heading(heading + 90.0 + half_window),
        }
    }

    /// Window bounds for one camera side.
    pub fn window(&self, side: CameraSide) -> (Degree, Degree) {
        match side {
            CameraSide::Left => (self.l_min, self.l_max),
            CameraSide::Right => (self.r_min, self.r_max),
        }
    }

    /// Circular width of one camera window in degrees.
    pub fn width(&self, side: CameraSide) -> Degree {
        let (min, max) = self.window(side);
        normalize_heading(max - min)
    }
}

impl Default for VisualExtents {
    fn default() -> Self {
        VisualExtents::from_heading(0.0, DEFAULT_FOV_DEG)
    }
}

/// Linearly interpolate a compass bearing inside a camera window.
///
/// A window whose `max_angle` is smaller than `min_angle` crosses the 0/360
/// seam and is unwrapped before interpolating; the result is wrapped back
/// into [0, 360).
///
/// Arguments
/// -----------------
/// * `norm_position`: normalized horizontal position, must lie on [0, 1].
/// * `min_angle`, `max_angle`: window bounds in degrees.
///
/// Return
/// ----------
/// * The interpolated bearing, or [`SightlineError::InterpolationOutOfRange`]
///   when `norm_position` is outside [0, 1] (a caller bug, not a data issue).
pub fn interpolate(
    norm_position: f64,
    min_angle: Degree,
    max_angle: Degree,
) -> Result<Degree, SightlineError> {
    if !(0.0..=1.0).contains(&norm_position) {
        return Err(SightlineError::InterpolationOutOfRange(norm_position));
    }

    let span = if max_angle >= min_angle {
        max_angle - min_angle
    } else {
        max_angle - min_angle + 360.0
    };
    Ok(normalize_heading(min_angle + span * norm_position))
}
