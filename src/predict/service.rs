use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use super::error::PredictError;
use super::pass_finder::{describe_pass, find_passes};
use super::propagation::look_angles;
use super::tle_loader::{parse_tle_lines, TleLoader, TleSet, FALLBACK_TLE};
use super::types::{PassDescriptor, Position};
use super::GroundStation;

#[derive(Debug, Clone)]
pub struct PredictorSettings {
    pub norad_id: u64,
    pub min_elevation: f64,
    pub ground_track_points: usize,
    pub search_window: Duration,
    pub min_refresh_interval: Duration,
}

impl Default for PredictorSettings {
    fn default() -> Self {
        Self {
            norad_id: 60238,
            min_elevation: 10.0,
            ground_track_points: 20,
            search_window: Duration::from_secs(3 * 24 * 3600),
            min_refresh_interval: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// New elements were loaded; carries their two-line text.
    Reloaded(String),
    RateLimited,
}

/// SGP4 pass prediction for one satellite seen from one ground station.
pub struct SgpPredictor {
    station: GroundStation,
    loader: Option<TleLoader>,
    settings: PredictorSettings,
    satellite: RwLock<TleSet>,
    last_refresh: RwLock<Option<Instant>>,
}

impl SgpPredictor {
    pub fn new(
        station: GroundStation,
        loader: Option<TleLoader>,
        settings: PredictorSettings,
    ) -> Result<Self, PredictError> {
        let satellite = match loader.as_ref().map(|l| l.load(settings.norad_id)) {
            Some(Ok(set)) => set,
            Some(Err(e)) => {
                warn!(
                    "Failed to load TLE for NORAD {}: {}, using built-in elements",
                    settings.norad_id, e
                );
                fallback()?
            }
            None => fallback()?,
        };
        info!(
            "Predicting {} (NORAD {}) from {} for station {}",
            satellite.name, satellite.norad_id, satellite.source, station
        );

        Ok(Self {
            station,
            loader,
            settings,
            satellite: RwLock::new(satellite),
            last_refresh: RwLock::new(None),
        })
    }

    pub fn position_at(&self, at: DateTime<Utc>) -> Result<Position, PredictError> {
        let satellite = self
            .satellite
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let angles = look_angles(&self.station, &satellite, at)?;
        Ok(Position {
            elevation: angles.elevation_deg,
            azimuth: angles.azimuth_deg,
            distance: angles.range_km,
        })
    }

    /// Up to `count` passes starting after `start`, ordered by AOS.
    pub fn passes_after(
        &self,
        start: DateTime<Utc>,
        count: usize,
    ) -> Result<Vec<PassDescriptor>, PredictError> {
        let satellite = self
            .satellite
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let window = chrono::Duration::from_std(self.settings.search_window)
            .map_err(|e| PredictError::Propagation(e.to_string()))?;

        let windows = find_passes(
            &self.station,
            &satellite,
            start,
            start + window,
            self.settings.min_elevation,
        )?;
        debug!(
            "Found {} passes in the next {:?}",
            windows.len(),
            self.settings.search_window
        );

        windows
            .iter()
            .take(count)
            .map(|w| {
                describe_pass(
                    &self.station,
                    &satellite,
                    w,
                    self.settings.ground_track_points,
                )
            })
            .collect()
    }

    /// Reloads the elements from the TLE folder, at most once per
    /// `min_refresh_interval`.
    pub fn refresh(&self) -> Result<RefreshOutcome, PredictError> {
        let mut last = self
            .last_refresh
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(at) = *last {
            if at.elapsed() < self.settings.min_refresh_interval {
                warn!(
                    "Last TLE update was less than {:?} ago",
                    self.settings.min_refresh_interval
                );
                return Ok(RefreshOutcome::RateLimited);
            }
        }

        let Some(loader) = &self.loader else {
            *last = Some(Instant::now());
            return Ok(RefreshOutcome::Reloaded(self.tle_text()));
        };
        let set = loader.load(self.settings.norad_id)?;
        *last = Some(Instant::now());

        let text = set.text();
        info!("Updated TLE for NORAD {} from {}", set.norad_id, set.source);
        *self
            .satellite
            .write()
            .unwrap_or_else(PoisonError::into_inner) = set;
        Ok(RefreshOutcome::Reloaded(text))
    }

    pub fn tle_text(&self) -> String {
        self.satellite
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .text()
    }
}

fn fallback() -> Result<TleSet, PredictError> {
    let (name, line1, line2) = parse_tle_lines(FALLBACK_TLE)?;
    TleSet::parse(name, &line1, &line2, "built-in")
}
