use std::fs;
use std::path::{Path, PathBuf};

use sgp4::{Constants, Elements};

use super::error::PredictError;

/// The reference satellite's elements, used when no TLE file matches.
pub const FALLBACK_TLE: &str = "\
1 60238U 24128D   25180.89646745  .00004045  00000+0  28654-3 0  9991
2 60238  61.9914   5.9727 0052120  61.8031 298.8311 15.05478104 53319";

/// One satellite's orbital elements, parsed and ready to propagate.
pub struct TleSet {
    pub name: String,
    pub norad_id: u64,
    pub line1: String,
    pub line2: String,
    pub source: String,
    pub elements: Elements,
    pub constants: Constants,
}

impl TleSet {
    pub fn parse(
        name: Option<String>,
        line1: &str,
        line2: &str,
        source: &str,
    ) -> Result<Self, PredictError> {
        let invalid = |message: String| PredictError::InvalidTle {
            file: source.to_string(),
            message,
        };
        let elements = Elements::from_tle(name.clone(), line1.as_bytes(), line2.as_bytes())
            .map_err(|e| invalid(e.to_string()))?;
        let constants = Constants::from_elements(&elements).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            name: name.unwrap_or_else(|| format!("NORAD {}", elements.norad_id)),
            norad_id: elements.norad_id,
            line1: line1.to_string(),
            line2: line2.to_string(),
            source: source.to_string(),
            elements,
            constants,
        })
    }

    /// Two-line text as forwarded to the router.
    pub fn text(&self) -> String {
        format!("{}\n{}", self.line1, self.line2)
    }
}

/// Finds a satellite's elements among the TLE files of a folder.
pub struct TleLoader {
    tle_dir: PathBuf,
}

impl TleLoader {
    pub fn new(tle_dir: PathBuf) -> Self {
        Self { tle_dir }
    }

    /// Scans every `.tle`/`.txt` file and returns the entry for `norad_id`.
    /// Files that fail to parse are skipped.
    pub fn load(&self, norad_id: u64) -> Result<TleSet, PredictError> {
        if !self.tle_dir.exists() {
            return Err(PredictError::DirectoryNotFound(
                self.tle_dir.display().to_string(),
            ));
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.tle_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext == "tle" || ext == "txt")
            })
            .collect();
        paths.sort();

        for path in paths {
            match self.find_in_file(&path, norad_id) {
                Ok(Some(set)) => return Ok(set),
                Ok(None) => {}
                Err(e) => log::warn!("Failed to parse TLE file {}: {}", path.display(), e),
            }
        }

        Err(PredictError::SatelliteNotFound(norad_id))
    }

    fn find_in_file(&self, path: &Path, norad_id: u64) -> Result<Option<TleSet>, PredictError> {
        let content = fs::read_to_string(path)?;
        let filename = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        for (name, line1, line2) in parse_multi_tle(&content) {
            let set = TleSet::parse(name, &line1, &line2, &filename)?;
            if set.norad_id == norad_id {
                return Ok(Some(set));
            }
        }
        Ok(None)
    }
}

/// Splits a single TLE set into `(name, line1, line2)`.
pub fn parse_tle_lines(tle: &str) -> Result<(Option<String>, String, String), PredictError> {
    let lines: Vec<&str> = tle
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    match lines.as_slice() {
        [l1, l2] if l1.starts_with("1 ") && l2.starts_with("2 ") => {
            Ok((None, l1.to_string(), l2.to_string()))
        }
        [name, l1, l2] if l1.starts_with("1 ") && l2.starts_with("2 ") => {
            Ok((Some(name.to_string()), l1.to_string(), l2.to_string()))
        }
        _ => Err(PredictError::InvalidTleFormat),
    }
}

/// Parses multi-satellite TLE content, with or without name lines.
fn parse_multi_tle(content: &str) -> Vec<(Option<String>, String, String)> {
    let lines: Vec<&str> = content
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    let mut result = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].starts_with("1 ") && i + 1 < lines.len() && lines[i + 1].starts_with("2 ") {
            result.push((None, lines[i].to_string(), lines[i + 1].to_string()));
            i += 2;
        } else if i + 2 < lines.len()
            && lines[i + 1].starts_with("1 ")
            && lines[i + 2].starts_with("2 ")
        {
            result.push((
                Some(lines[i].to_string()),
                lines[i + 1].to_string(),
                lines[i + 2].to_string(),
            ));
            i += 3;
        } else {
            i += 1;
        }
    }

    result
}
