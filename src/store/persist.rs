use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::store::Passage;

/// `{aos_utc}_{rounded max elevation}_{frame_count}.json`
pub fn file_name(passage: &Passage) -> String {
    format!(
        "{}_{}_{}.json",
        passage.aos_utc(),
        passage.max_elevation().round() as i64,
        passage.frame_count()
    )
}

pub fn render<'a>(passages: impl IntoIterator<Item = &'a Passage>) -> io::Result<Vec<u8>> {
    let by_number: BTreeMap<i64, &Passage> = passages
        .into_iter()
        .map(|p| (p.passage_number(), p))
        .collect();
    serde_json::to_vec_pretty(&by_number)
        .map_err(|e| io::Error::other(format!("Failed to serialize passages: {}", e)))
}

/// Writes `contents` into `folder` through a synced temporary file and a
/// rename, so the target either holds the full contents or does not exist.
///
/// An existing file is never replaced: the name gets a `-2`, `-3`, ...
/// suffix instead. Callers must not write into the same folder concurrently.
pub fn write_atomically(folder: &Path, name: &str, contents: &[u8]) -> io::Result<PathBuf> {
    fs::create_dir_all(folder)?;

    let target = free_path(folder, name);
    let tmp = folder.join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()));

    let result = File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(contents)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&tmp, &target));

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    sync_dir(folder)?;
    Ok(target)
}

fn free_path(folder: &Path, name: &str) -> PathBuf {
    let target = folder.join(name);
    if !target.exists() {
        return target;
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{}", ext)),
        None => (name, String::new()),
    };
    (2..)
        .map(|n| folder.join(format!("{}-{}{}", stem, n, ext)))
        .find(|path| !path.exists())
        .unwrap_or(target)
}

/// Makes the rename itself durable.
#[cfg(unix)]
fn sync_dir(folder: &Path) -> io::Result<()> {
    File::open(folder)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_folder: &Path) -> io::Result<()> {
    Ok(())
}
