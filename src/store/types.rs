use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::epoch::utc_display;
use crate::predict::{check_pass_geometry, PassDescriptor};
use crate::store::StoreError;

/// Passage number carried by frames received outside any tracked pass.
pub const NO_PASSAGE: i64 = -1;

/// Ground-station link that decoded a frame, serialized as `[host, port]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkId(pub String, pub u16);

impl LinkId {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self(host.into(), port)
    }

    pub fn host(&self) -> &str {
        &self.0
    }

    pub fn port(&self) -> u16 {
        self.1
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0, self.1)
    }
}

/// One decoded telemetry frame, tagged with geometry and passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct Frame {
    /// Receipt time, epoch seconds
    pub timestamp: f64,
    pub elevation: f64,
    pub azimuth: f64,
    pub distance: f64,
    #[schema(value_type = Vec<Object>, example = json!(["10.0.0.5", 8001]))]
    pub link_id: LinkId,
    pub passage_number: i64,
    #[serde(with = "crate::codec::hex_text")]
    #[schema(value_type = String, example = "0x86 0xa2 0x86 0xa2")]
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn validate(&self) -> Result<(), StoreError> {
        for (name, value) in [
            ("timestamp", self.timestamp),
            ("elevation", self.elevation),
            ("azimuth", self.azimuth),
            ("distance", self.distance),
        ] {
            if !value.is_finite() {
                return Err(StoreError::Schema(format!("frame {} is not finite", name)));
            }
        }
        if self.passage_number < NO_PASSAGE {
            return Err(StoreError::Schema(format!(
                "frame passage_number {} is below {}",
                self.passage_number, NO_PASSAGE
            )));
        }
        Ok(())
    }
}

/// Body of a create call: a predicted pass plus its store bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct NewPassage {
    pub passage_number: i64,
    /// (azimuth, elevation) pairs in degrees
    #[schema(value_type = Vec<Vec<f64>>)]
    pub ground_track: Vec<[f64; 2]>,
    pub tle_line1: String,
    pub tle_line2: String,
    #[schema(value_type = Vec<Vec<Object>>)]
    pub link_clients: BTreeSet<LinkId>,
    pub frame_count: u64,
    pub aos: f64,
    pub los: f64,
    pub start_azimuth: f64,
    pub end_azimuth: f64,
    pub max_elevation: f64,
    pub sample_times: Vec<f64>,
    pub frames: Vec<Frame>,
}

impl NewPassage {
    pub fn from_descriptor(passage_number: i64, pass: PassDescriptor) -> Self {
        Self {
            passage_number,
            ground_track: pass.ground_track,
            tle_line1: pass.tle_line1,
            tle_line2: pass.tle_line2,
            link_clients: BTreeSet::new(),
            frame_count: 0,
            aos: pass.aos,
            los: pass.los,
            start_azimuth: pass.start_azimuth,
            end_azimuth: pass.end_azimuth,
            max_elevation: pass.max_elevation,
            sample_times: pass.sample_times,
            frames: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.passage_number < 0 {
            return Err(StoreError::Schema(format!(
                "passage_number {} is negative",
                self.passage_number
            )));
        }
        check_pass_geometry(
            &self.ground_track,
            &self.sample_times,
            self.aos,
            self.los,
            [self.start_azimuth, self.end_azimuth],
            self.max_elevation,
        )
        .map_err(StoreError::Schema)?;
        if self.frame_count != self.frames.len() as u64 {
            return Err(StoreError::Schema(format!(
                "frame_count {} does not match {} frames",
                self.frame_count,
                self.frames.len()
            )));
        }
        for frame in &self.frames {
            frame.validate()?;
            if frame.passage_number != self.passage_number {
                return Err(StoreError::Schema(format!(
                    "frame references passage {} inside passage {}",
                    frame.passage_number, self.passage_number
                )));
            }
        }
        Ok(())
    }
}

/// A resident passage. Frames can only be added through [`Passage::push_frame`],
/// which keeps `frame_count` equal to the number of frames.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passage {
    passage_number: i64,
    ground_track: Vec<[f64; 2]>,
    tle_line1: String,
    tle_line2: String,
    link_clients: BTreeSet<LinkId>,
    frame_count: u64,
    aos: f64,
    los: f64,
    aos_utc: String,
    los_utc: String,
    start_azimuth: f64,
    end_azimuth: f64,
    max_elevation: f64,
    sample_times: Vec<f64>,
    frames: Vec<Frame>,
}

impl Passage {
    pub(super) fn admit(new: NewPassage) -> Result<Self, StoreError> {
        new.validate()?;
        let display = |epoch: f64, name: &str| {
            utc_display(epoch)
                .ok_or_else(|| StoreError::Schema(format!("{} {} is out of range", name, epoch)))
        };
        let aos_utc = display(new.aos, "aos")?;
        let los_utc = display(new.los, "los")?;

        Ok(Self {
            passage_number: new.passage_number,
            ground_track: new.ground_track,
            tle_line1: new.tle_line1,
            tle_line2: new.tle_line2,
            link_clients: new.link_clients,
            frame_count: new.frames.len() as u64,
            aos: new.aos,
            los: new.los,
            aos_utc,
            los_utc,
            start_azimuth: new.start_azimuth,
            end_azimuth: new.end_azimuth,
            max_elevation: new.max_elevation,
            sample_times: new.sample_times,
            frames: new.frames,
        })
    }

    pub(super) fn push_frame(&mut self, frame: Frame) {
        self.link_clients.insert(frame.link_id.clone());
        self.frames.push(frame);
        self.frame_count = self.frames.len() as u64;
    }

    pub fn passage_number(&self) -> i64 {
        self.passage_number
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn link_clients(&self) -> &BTreeSet<LinkId> {
        &self.link_clients
    }

    pub fn aos(&self) -> f64 {
        self.aos
    }

    pub fn los(&self) -> f64 {
        self.los
    }

    pub fn aos_utc(&self) -> &str {
        &self.aos_utc
    }

    pub fn los_utc(&self) -> &str {
        &self.los_utc
    }

    pub fn max_elevation(&self) -> f64 {
        self.max_elevation
    }

    pub fn summary(&self) -> PassageSummary {
        PassageSummary {
            passage_number: self.passage_number,
            aos_utc: self.aos_utc.clone(),
            los_utc: self.los_utc.clone(),
            frame_count: self.frame_count,
            link_count: self.link_clients.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PassageSummary {
    pub passage_number: i64,
    pub aos_utc: String,
    pub los_utc: String,
    pub frame_count: u64,
    pub link_count: usize,
}
