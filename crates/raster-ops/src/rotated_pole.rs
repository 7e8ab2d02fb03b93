//! Rotated-pole source projection.

use serde::{Deserialize, Serialize};

/// Rotated-pole grid of a CORDEX domain, as an `ob_tran` PROJ definition.
///
/// Defaults describe EUR-11: north pole at 39.25°N 198°E, i.e.
/// `o_lat_p=39.25` with the grid rotated around `lon_0=18`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotatedPole {
    pub pole_latitude: f64,
    pub pole_longitude: f64,
    pub central_meridian: f64,
    /// Degrees to radians; rotated coordinates are stored in degrees
    pub to_meter: f64,
}

impl Default for RotatedPole {
    fn default() -> Self {
        Self {
            pole_latitude: 39.25,
            pole_longitude: 0.0,
            central_meridian: 18.0,
            to_meter: 0.01745329,
        }
    }
}

impl RotatedPole {
    pub fn to_proj4(&self) -> String {
        format!(
            "+proj=ob_tran +o_proj=longlat +o_lon_p={} +o_lat_p={} +lon_0={} +to_meter={}",
            self.pole_longitude, self.pole_latitude, self.central_meridian, self.to_meter
        )
    }
}
