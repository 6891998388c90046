use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::link::{BackoffSettings, LinkSettings};
use crate::predict::PredictorSettings;
use crate::scheduler::{InvalidCandidatePolicy, SchedulerSettings};
use crate::store::LinkId;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub router: RouterConfig,
    pub predictor: PredictorConfig,
    pub scheduler: SchedulerConfig,
    pub link: LinkConfig,
    pub links: Vec<LinkEndpoint>,
    pub endpoints: EndpointsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub bind: String,
    pub data_folder: PathBuf,
    pub max_resident: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8001".to_string(),
            data_folder: PathBuf::from("data"),
            max_resident: 8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub bind: String,
    pub first_passage_number: i64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            first_passage_number: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    pub bind: String,
    pub tle_folder: Option<PathBuf>,
    pub norad_id: u64,
    /// "lat, lon" in degrees
    pub coordinates: String,
    pub altitude_m: f64,
    pub min_elevation: f64,
    pub ground_track_points: usize,
    #[serde(deserialize_with = "duration")]
    pub search_window: Duration,
    #[serde(deserialize_with = "duration")]
    pub min_refresh_interval: Duration,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        let settings = PredictorSettings::default();
        Self {
            bind: "127.0.0.1:8002".to_string(),
            tle_folder: None,
            norad_id: settings.norad_id,
            coordinates: "38.7314, -9.3024".to_string(),
            altitude_m: 0.0,
            min_elevation: settings.min_elevation,
            ground_track_points: settings.ground_track_points,
            search_window: settings.search_window,
            min_refresh_interval: settings.min_refresh_interval,
        }
    }
}

impl PredictorConfig {
    pub fn settings(&self) -> PredictorSettings {
        PredictorSettings {
            norad_id: self.norad_id,
            min_elevation: self.min_elevation,
            ground_track_points: self.ground_track_points,
            search_window: self.search_window,
            min_refresh_interval: self.min_refresh_interval,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub candidates: usize,
    #[serde(deserialize_with = "duration")]
    pub horizon: Duration,
    #[serde(deserialize_with = "duration")]
    pub end_delay: Duration,
    #[serde(deserialize_with = "duration")]
    pub fetch_retry: Duration,
    #[serde(deserialize_with = "duration")]
    pub default_rescan: Duration,
    #[serde(deserialize_with = "duration")]
    pub min_rescan: Duration,
    #[serde(deserialize_with = "duration")]
    pub settle: Duration,
    #[serde(deserialize_with = "duration")]
    pub poll_interval: Duration,
    pub on_invalid_candidates: InvalidCandidatePolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let s = SchedulerSettings::default();
        Self {
            candidates: s.candidates,
            horizon: s.horizon,
            end_delay: s.end_delay,
            fetch_retry: s.fetch_retry,
            default_rescan: s.default_rescan,
            min_rescan: s.min_rescan,
            settle: s.settle,
            poll_interval: s.poll_interval,
            on_invalid_candidates: s.on_invalid_candidates,
        }
    }
}

impl SchedulerConfig {
    pub fn settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            candidates: self.candidates,
            horizon: self.horizon,
            end_delay: self.end_delay,
            fetch_retry: self.fetch_retry,
            default_rescan: self.default_rescan,
            min_rescan: self.min_rescan,
            settle: self.settle,
            poll_interval: self.poll_interval,
            on_invalid_candidates: self.on_invalid_candidates,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    #[serde(deserialize_with = "duration")]
    pub backoff_initial: Duration,
    #[serde(deserialize_with = "duration")]
    pub backoff_max: Duration,
    pub backoff_multiplier: f64,
    pub min_read_bytes: usize,
    #[serde(deserialize_with = "duration")]
    pub short_read_pause: Duration,
    pub read_buffer: usize,
    pub max_frame_len: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        let s = LinkSettings::default();
        Self {
            backoff_initial: s.backoff.initial,
            backoff_max: s.backoff.max,
            backoff_multiplier: s.backoff.multiplier,
            min_read_bytes: s.min_read_bytes,
            short_read_pause: s.short_read_pause,
            read_buffer: s.read_buffer,
            max_frame_len: s.max_frame_len,
        }
    }
}

impl LinkConfig {
    pub fn settings(&self) -> LinkSettings {
        LinkSettings {
            backoff: BackoffSettings {
                initial: self.backoff_initial,
                max: self.backoff_max,
                multiplier: self.backoff_multiplier,
            },
            min_read_bytes: self.min_read_bytes,
            short_read_pause: self.short_read_pause,
            read_buffer: self.read_buffer,
            max_frame_len: self.max_frame_len,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinkEndpoint {
    pub host: String,
    pub port: u16,
}

impl LinkEndpoint {
    pub fn id(&self) -> LinkId {
        LinkId::new(self.host.clone(), self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub store: String,
    pub router: String,
    pub predictor: String,
    /// Whether the predictor pushes fresh elements to the router
    pub router_tle_push: bool,
    #[serde(deserialize_with = "duration")]
    pub timeout: Duration,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            store: "http://127.0.0.1:8001".to_string(),
            router: "http://127.0.0.1:8000".to_string(),
            predictor: "http://127.0.0.1:8002".to_string(),
            router_tle_push: true,
            timeout: Duration::from_secs(30),
        }
    }
}

fn duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        // a document holding only comments is null, not an empty mapping
        let config: Option<Self> = serde_yaml::from_str(yaml)?;
        Ok(config.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.store.max_resident, 8);
        assert_eq!(config.router.first_passage_number, 1);
        assert_eq!(config.predictor.norad_id, 60238);
        assert!(config.links.is_empty());
        assert_eq!(config.link.settings(), LinkSettings::default());
        assert_eq!(config.scheduler.settings(), SchedulerSettings::default());
    }

    #[test]
    fn comment_only_file_is_all_defaults() {
        let yaml = "# nothing configured yet\n\n# links: []\n";
        let config = Config::from_str(yaml).unwrap();
        assert_eq!(config.store.max_resident, 8);
        assert!(config.links.is_empty());

        let config = Config::from_str("~\n").unwrap();
        assert_eq!(config.router.first_passage_number, 1);
    }

    #[test]
    fn parses_durations_and_sections() {
        let yaml = r#"
store:
  data_folder: /var/lib/passages
router:
  first_passage_number: 40
scheduler:
  horizon: 90min
  on_invalid_candidates: stall
link:
  backoff_initial: 5s
  backoff_max: 2m
  backoff_multiplier: 2
  max_frame_len: 512
links:
  - host: 10.0.0.5
    port: 8001
  - host: 10.0.0.6
    port: 8001
endpoints:
  timeout: 500ms
"#;
        let config = Config::from_str(yaml).unwrap();
        assert_eq!(config.store.data_folder, PathBuf::from("/var/lib/passages"));
        assert_eq!(config.store.bind, "127.0.0.1:8001");
        assert_eq!(config.router.first_passage_number, 40);

        let scheduler = config.scheduler.settings();
        assert_eq!(scheduler.horizon, Duration::from_secs(5400));
        assert_eq!(
            scheduler.on_invalid_candidates,
            InvalidCandidatePolicy::Stall
        );
        assert_eq!(scheduler.end_delay, Duration::from_secs(60));

        let link = config.link.settings();
        assert_eq!(link.backoff.initial, Duration::from_secs(5));
        assert_eq!(link.backoff.max, Duration::from_secs(120));
        assert_eq!(link.backoff.multiplier, 2.0);
        assert_eq!(link.max_frame_len, 512);
        assert_eq!(link.read_buffer, 1024);

        assert_eq!(config.links[1].id(), LinkId::new("10.0.0.6", 8001));
        assert_eq!(config.endpoints.timeout, Duration::from_millis(500));
    }

    #[test]
    fn rejects_bad_durations() {
        assert!(matches!(
            Config::from_str("scheduler:\n  horizon: soon\n"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
