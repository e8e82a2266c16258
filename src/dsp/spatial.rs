//! Distance attenuation and listener-relative angles.

/*
Coordinate System
=================

Right-handed, listener-centric. The listener's orientation is two vectors:
`at` (where the nose points) and `up`. The default listener faces +y with +z
up, so +x is to the right.

    azimuth    degrees clockwise from `at` in the horizontal plane, [0, 360)
               0 = ahead, 90 = right, 180 = behind, 270 = left
    elevation  degrees above the horizontal plane, [-90, 90]

Distance models follow the WebAudio PannerNode formulas. `d` is clamped to
[distance_ref, distance_max] where the formula needs it.

    linear       1 - rolloff · (d - ref) / (max - ref)
    exponential  (d / ref) ^ -rolloff
    inverse      ref / (ref + rolloff · (d - ref))

Closeness boost raises the gain by `closeness_boost` dB for sources nearer
than `closeness_boost_distance`, which keeps very near sounds from being
lost against distant ones.
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{check_range, Error, Result};

pub type Vec3 = [f64; 3];

/// Facing +y with +z up.
pub const DEFAULT_ORIENTATION: [f64; 6] = [0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceModel {
    None,
    #[default]
    Linear,
    Exponential,
    Inverse,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceParams {
    pub model: DistanceModel,
    pub distance_ref: f64,
    pub distance_max: f64,
    pub rolloff: f64,
    /// Decibels added to sources closer than `closeness_boost_distance`.
    pub closeness_boost: f64,
    pub closeness_boost_distance: f64,
}

impl Default for DistanceParams {
    fn default() -> Self {
        Self {
            model: DistanceModel::Linear,
            distance_ref: 1.0,
            distance_max: 50.0,
            rolloff: 1.0,
            closeness_boost: 0.0,
            closeness_boost_distance: 0.0,
        }
    }
}

impl DistanceParams {
    pub(crate) fn validate(&self) -> Result<()> {
        check_range("distance_ref", self.distance_ref, 0.0, f64::MAX)?;
        check_range("distance_max", self.distance_max, 0.0, f64::MAX)?;
        check_range("rolloff", self.rolloff, 0.0, f64::MAX)?;
        check_range("closeness_boost", self.closeness_boost, -60.0, 60.0)?;
        check_range(
            "closeness_boost_distance",
            self.closeness_boost_distance,
            0.0,
            f64::MAX,
        )?;
        if self.distance_max < self.distance_ref {
            return Err(Error::InvalidProperty {
                property: "distance_max",
                reason: "must not be less than distance_ref",
            });
        }
        Ok(())
    }

    /// Linear gain for a source `distance` units away.
    pub fn gain_at(&self, distance: f64) -> f64 {
        let DistanceParams {
            distance_ref: r,
            distance_max: max,
            rolloff,
            ..
        } = *self;

        let gain = match self.model {
            DistanceModel::None => 1.0,
            DistanceModel::Linear => {
                if max <= r {
                    1.0
                } else {
                    let d = distance.clamp(r, max);
                    1.0 - rolloff * (d - r) / (max - r)
                }
            }
            DistanceModel::Exponential => {
                if r == 0.0 {
                    1.0
                } else {
                    (distance.max(r) / r).powf(-rolloff)
                }
            }
            DistanceModel::Inverse => {
                if r == 0.0 {
                    1.0
                } else {
                    r / (r + rolloff * (distance.max(r) - r))
                }
            }
        }
        .clamp(0.0, 1.0);

        if distance < self.closeness_boost_distance {
            gain * 10f64.powf(self.closeness_boost / 20.0)
        } else {
            gain
        }
    }
}

/// Listener-relative position of a source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub azimuth: f64,
    pub elevation: f64,
    pub distance: f64,
}

fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn norm(a: Vec3) -> f64 {
    dot(a, a).sqrt()
}

fn scale(a: Vec3, s: f64) -> Vec3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

/// Check an `[at, up]` orientation: both non-zero and perpendicular.
pub fn validate_orientation(orientation: [f64; 6]) -> Result<()> {
    let at = [orientation[0], orientation[1], orientation[2]];
    let up = [orientation[3], orientation[4], orientation[5]];
    if orientation.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidProperty {
            property: "orientation",
            reason: "components must be finite",
        });
    }
    let (la, lu) = (norm(at), norm(up));
    if la < 1e-9 || lu < 1e-9 {
        return Err(Error::InvalidProperty {
            property: "orientation",
            reason: "at and up must be non-zero",
        });
    }
    if (dot(at, up) / (la * lu)).abs() > 1e-3 {
        return Err(Error::InvalidProperty {
            property: "orientation",
            reason: "at and up must be perpendicular",
        });
    }
    Ok(())
}

/// Where `source` sits relative to a listener at `listener` facing `orientation`.
pub fn placement(listener: Vec3, orientation: [f64; 6], source: Vec3) -> Placement {
    let at = [orientation[0], orientation[1], orientation[2]];
    let up = [orientation[3], orientation[4], orientation[5]];
    let at = scale(at, 1.0 / norm(at).max(1e-12));
    let up = scale(up, 1.0 / norm(up).max(1e-12));
    let right = cross(at, up);

    let v = [
        source[0] - listener[0],
        source[1] - listener[1],
        source[2] - listener[2],
    ];
    let distance = norm(v);
    if distance < 1e-9 {
        return Placement {
            azimuth: 0.0,
            elevation: 0.0,
            distance: 0.0,
        };
    }

    let x = dot(v, right);
    let y = dot(v, at);
    let z = dot(v, up);
    let mut azimuth = x.atan2(y).to_degrees();
    if azimuth < 0.0 {
        azimuth += 360.0;
    }
    let elevation = (z / distance).clamp(-1.0, 1.0).asin().to_degrees();
    Placement {
        azimuth: azimuth % 360.0,
        elevation,
        distance,
    }
}
