use chrono::{DateTime, TimeZone, Utc};

/// Display format for AOS/LOS in stored passages and flush file names.
pub const UTC_DISPLAY_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

pub fn now_epoch() -> f64 {
    to_epoch(Utc::now())
}

pub fn to_epoch(time: DateTime<Utc>) -> f64 {
    time.timestamp_micros() as f64 / 1_000_000.0
}

pub fn from_epoch(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() {
        return None;
    }
    let micros = (epoch * 1_000_000.0).round();
    if micros.abs() > i64::MAX as f64 {
        return None;
    }
    Utc.timestamp_micros(micros as i64).single()
}

pub fn utc_display(epoch: f64) -> Option<String> {
    from_epoch(epoch).map(|t| t.format(UTC_DISPLAY_FORMAT).to_string())
}
