use chrono::{DateTime, Duration, Utc};

use super::error::PredictError;
use super::propagation::look_angles;
use super::tle_loader::TleSet;
use super::types::PassDescriptor;
use super::GroundStation;
use crate::epoch::to_epoch;

const COARSE_STEP_SECONDS: i64 = 60;
const FINE_STEP_SECONDS: i64 = 1;
const HORIZON_ELEVATION: f64 = 0.0;

/// Horizon crossings of one pass, before ground-track sampling.
#[derive(Debug, Clone, PartialEq)]
pub struct PassWindow {
    pub aos: DateTime<Utc>,
    pub los: DateTime<Utc>,
    pub aos_azimuth_deg: f64,
    pub los_azimuth_deg: f64,
    pub max_elevation_deg: f64,
}

/// Finds complete passes within `[start, end]` that peak at or above
/// `min_elevation`. A pass already above the horizon at `start` or still
/// above it at `end` is left out because one of its crossings is unknown.
pub fn find_passes(
    station: &GroundStation,
    satellite: &TleSet,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    min_elevation: f64,
) -> Result<Vec<PassWindow>, PredictError> {
    let coarse_step = Duration::seconds(COARSE_STEP_SECONDS);
    let mut passes = Vec::new();
    let mut cursor = start;

    let mut prev_visible =
        look_angles(station, satellite, start)?.elevation_deg >= HORIZON_ELEVATION;
    let mut rising: Option<(DateTime<Utc>, f64)> = None;
    let mut max_el = f64::MIN;

    while cursor <= end {
        let sample = look_angles(station, satellite, cursor)?;
        let visible = sample.elevation_deg >= HORIZON_ELEVATION;

        if visible && !prev_visible {
            rising = Some(refine_crossing(
                station,
                satellite,
                cursor - coarse_step,
                cursor,
                true,
            )?);
            max_el = sample.elevation_deg;
        } else if visible {
            max_el = max_el.max(sample.elevation_deg);
        } else if prev_visible {
            if let Some((aos, aos_az)) = rising.take() {
                let (los, los_az) =
                    refine_crossing(station, satellite, cursor - coarse_step, cursor, false)?;
                if max_el >= min_elevation {
                    passes.push(PassWindow {
                        aos,
                        los,
                        aos_azimuth_deg: aos_az,
                        los_azimuth_deg: los_az,
                        max_elevation_deg: max_el,
                    });
                }
            }
        }

        prev_visible = visible;
        cursor += coarse_step;
    }

    Ok(passes)
}

/// Binary search down to one second for the horizon crossing between
/// `before` and `after`. Returns the crossing time and azimuth there.
fn refine_crossing(
    station: &GroundStation,
    satellite: &TleSet,
    before: DateTime<Utc>,
    after: DateTime<Utc>,
    rising: bool,
) -> Result<(DateTime<Utc>, f64), PredictError> {
    let mut low = before;
    let mut high = after;

    while (high - low).num_seconds() > FINE_STEP_SECONDS {
        let mid = low + (high - low) / 2;
        let above = look_angles(station, satellite, mid)?.elevation_deg >= HORIZON_ELEVATION;
        if above == rising {
            high = mid;
        } else {
            low = mid;
        }
    }

    let crossing = look_angles(station, satellite, high)?;
    Ok((high, crossing.azimuth_deg))
}

/// Samples `points` look angles at `aos + i * (los - aos) / points` and
/// builds the descriptor handed to the scheduler.
pub fn describe_pass(
    station: &GroundStation,
    satellite: &TleSet,
    window: &PassWindow,
    points: usize,
) -> Result<PassDescriptor, PredictError> {
    let span = window.los - window.aos;
    let mut ground_track = Vec::with_capacity(points);
    let mut sample_times = Vec::with_capacity(points);

    for i in 0..points {
        let at = window.aos + span * i as i32 / points.max(1) as i32;
        let sample = look_angles(station, satellite, at)?;
        ground_track.push([sample.azimuth_deg, sample.elevation_deg]);
        sample_times.push(to_epoch(at));
    }

    Ok(PassDescriptor {
        ground_track,
        tle_line1: satellite.line1.clone(),
        tle_line2: satellite.line2.clone(),
        sample_times,
        aos: to_epoch(window.aos),
        los: to_epoch(window.los),
        start_azimuth: window.aos_azimuth_deg,
        end_azimuth: window.los_azimuth_deg,
        max_elevation: window.max_elevation_deg,
    })
}
