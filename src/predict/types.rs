use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A predicted pass as handed out by the prediction service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PassDescriptor {
    /// (azimuth, elevation) pairs in degrees, one per entry of `sample_times`
    #[schema(value_type = Vec<Vec<f64>>)]
    pub ground_track: Vec<[f64; 2]>,
    pub tle_line1: String,
    pub tle_line2: String,
    pub sample_times: Vec<f64>,
    /// Epoch seconds
    pub aos: f64,
    /// Epoch seconds
    pub los: f64,
    pub start_azimuth: f64,
    pub end_azimuth: f64,
    pub max_elevation: f64,
}

impl PassDescriptor {
    pub fn validate(&self) -> Result<(), String> {
        check_pass_geometry(
            &self.ground_track,
            &self.sample_times,
            self.aos,
            self.los,
            [self.start_azimuth, self.end_azimuth],
            self.max_elevation,
        )
    }
}

/// Current look angles of the satellite from the ground station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct Position {
    pub elevation: f64,
    pub azimuth: f64,
    /// Slant range, km
    pub distance: f64,
}

impl Position {
    pub fn above_horizon(&self) -> bool {
        self.elevation >= 0.0
    }
}

pub(crate) fn check_pass_geometry(
    ground_track: &[[f64; 2]],
    sample_times: &[f64],
    aos: f64,
    los: f64,
    azimuths: [f64; 2],
    max_elevation: f64,
) -> Result<(), String> {
    if ground_track.len() != sample_times.len() {
        return Err(format!(
            "ground_track has {} points but sample_times has {}",
            ground_track.len(),
            sample_times.len()
        ));
    }
    let scalars = [aos, los, azimuths[0], azimuths[1], max_elevation];
    let all_finite = scalars.iter().all(|v| v.is_finite())
        && sample_times.iter().all(|v| v.is_finite())
        && ground_track.iter().flatten().all(|v| v.is_finite());
    if !all_finite {
        return Err("pass contains a non-finite value".into());
    }
    if aos > los {
        return Err(format!("aos {} is after los {}", aos, los));
    }
    if !(-90.0..=90.0).contains(&max_elevation) {
        return Err(format!("max_elevation {} is out of range", max_elevation));
    }
    Ok(())
}
