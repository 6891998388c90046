use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::persist;
use super::types::{Frame, NewPassage, Passage, PassageSummary};
use super::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TleRecord {
    pub tle: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlushReport {
    pub path: PathBuf,
    pub passages: usize,
    pub frames: u64,
}

#[derive(Debug, Default)]
struct Resident {
    passages: HashMap<i64, Passage>,
    /// Passage numbers, oldest creation first
    order: VecDeque<i64>,
}

impl Resident {
    fn oldest(&self) -> Option<&Passage> {
        self.order.front().and_then(|n| self.passages.get(n))
    }

    fn in_order(&self) -> impl Iterator<Item = &Passage> {
        self.order.iter().filter_map(|n| self.passages.get(n))
    }

    fn clear(&mut self) {
        self.passages.clear();
        self.order.clear();
    }
}

/// Authoritative owner of resident passages and their frames.
///
/// Every operation takes the same lock, so create, append and flush never
/// interleave.
pub struct PassageStore {
    data_folder: PathBuf,
    max_resident: usize,
    resident: Mutex<Resident>,
    last_tle: Mutex<Option<TleRecord>>,
}

impl PassageStore {
    pub fn new(data_folder: PathBuf, max_resident: usize) -> Self {
        Self {
            data_folder,
            max_resident: max_resident.max(1),
            resident: Mutex::new(Resident::default()),
            last_tle: Mutex::new(None),
        }
    }

    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    pub fn create(&self, new: NewPassage) -> Result<(), StoreError> {
        let number = new.passage_number;
        debug!(
            "Creating passage {} (aos {}, los {})",
            number, new.aos, new.los
        );

        let passage = Passage::admit(new)?;

        let mut resident = self.resident.lock().unwrap_or_else(PoisonError::into_inner);
        if resident.passages.contains_key(&number) {
            return Err(StoreError::Duplicate(number));
        }
        if resident.passages.len() >= self.max_resident {
            return Err(StoreError::Capacity(resident.passages.len()));
        }

        info!(
            "Passage {} created: aos {} los {}",
            number,
            passage.aos_utc(),
            passage.los_utc()
        );
        resident.passages.insert(number, passage);
        resident.order.push_back(number);
        Ok(())
    }

    pub fn append(&self, frame: Frame) -> Result<(), StoreError> {
        frame.validate()?;

        let mut resident = self.resident.lock().unwrap_or_else(PoisonError::into_inner);
        let number = frame.passage_number;
        let passage = resident
            .passages
            .get_mut(&number)
            .ok_or(StoreError::NotFound(number))?;

        passage.push_frame(frame);
        debug!(
            "Frame added to passage {} ({} frames)",
            number,
            passage.frame_count()
        );
        Ok(())
    }

    /// Persists every resident passage into one file named after the oldest,
    /// then forgets them. Memory is left untouched if the write fails.
    pub fn flush(&self) -> Result<FlushReport, StoreError> {
        let mut resident = self.resident.lock().unwrap_or_else(PoisonError::into_inner);

        let oldest = resident.oldest().ok_or(StoreError::Empty)?;
        let name = persist::file_name(oldest);
        let target = self.data_folder.join(&name);
        let persistence = |source| StoreError::Persistence {
            path: target.clone(),
            source,
        };

        let contents = persist::render(resident.in_order()).map_err(persistence)?;
        let path = persist::write_atomically(&self.data_folder, &name, &contents)
            .map_err(persistence)?;

        let report = FlushReport {
            path,
            passages: resident.passages.len(),
            frames: resident.in_order().map(Passage::frame_count).sum(),
        };
        resident.clear();

        info!(
            "Flushed {} passage(s), {} frame(s) to {}",
            report.passages,
            report.frames,
            report.path.display()
        );
        Ok(report)
    }

    /// Keeps the latest orbital elements. Nothing is persisted yet.
    pub fn update_tle(&self, tle: String) {
        debug!("Received TLE update: {:?}", tle);
        if tle.trim().is_empty() {
            warn!("Received an empty TLE update");
        }
        let mut last = self.last_tle.lock().unwrap_or_else(PoisonError::into_inner);
        *last = Some(TleRecord {
            tle,
            received_at: Utc::now(),
        });
    }

    pub fn last_tle(&self) -> Option<TleRecord> {
        self.last_tle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn resident(&self) -> Vec<PassageSummary> {
        let resident = self.resident.lock().unwrap_or_else(PoisonError::into_inner);
        resident.in_order().map(Passage::summary).collect()
    }

    /// Runs `f` against a resident passage, if present.
    pub fn with_passage<T>(&self, number: i64, f: impl FnOnce(&Passage) -> T) -> Option<T> {
        let resident = self.resident.lock().unwrap_or_else(PoisonError::into_inner);
        resident.passages.get(&number).map(f)
    }
}

pub(crate) fn log_rejection(operation: &str, err: &StoreError) {
    match err {
        StoreError::Persistence { .. } => error!("{} failed: {}", operation, err),
        _ => warn!("{} rejected: {}", operation, err),
    }
}
