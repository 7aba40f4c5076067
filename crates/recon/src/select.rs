use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::filename::{basename, parse_dates, FileDates};

/// A source file that survived de-duplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// `base_dir` joined with the candidate's relative name.
    pub path: PathBuf,
    /// Basename of the file.
    pub file_name: String,
    pub dates: FileDates,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey {
    Dated(String),
    /// Files without a `D` date never collide with each other.
    Undated(String),
}

/// True when the lowercase file name ends with one of `extensions`.
pub fn has_source_extension(name: &str, extensions: &[String]) -> bool {
    let lower = name.to_lowercase();
    extensions.iter().any(|ext| lower.ends_with(&ext.to_lowercase()))
}

/// Keep one file per `D` date: the one with the largest JV date.
///
/// Candidates with an unrecognized extension are dropped. Ties keep the first
/// candidate seen. Output is ordered by lowercase basename.
pub fn select_latest(base_dir: &Path, files: &[String], extensions: &[String]) -> Vec<SelectedFile> {
    let mut order: Vec<GroupKey> = Vec::new();
    let mut chosen: HashMap<GroupKey, SelectedFile> = HashMap::new();

    for name in files {
        if !has_source_extension(name, extensions) {
            continue;
        }

        let dates = parse_dates(name);
        let candidate = SelectedFile {
            path: base_dir.join(name),
            file_name: basename(name).to_string(),
            dates,
        };

        let key = match &candidate.dates.d_date {
            Some(d) => GroupKey::Dated(d.clone()),
            None => GroupKey::Undated(name.clone()),
        };

        match chosen.get(&key) {
            None => {
                order.push(key.clone());
                chosen.insert(key, candidate);
            }
            Some(current) if candidate.dates.jv_rank() > current.dates.jv_rank() => {
                log::debug!(
                    "{} supersedes {} for D date {:?}",
                    candidate.file_name,
                    current.file_name,
                    candidate.dates.d_date
                );
                chosen.insert(key, candidate);
            }
            Some(current) => {
                log::debug!("{} superseded by {}", candidate.file_name, current.file_name);
            }
        }
    }

    let mut results: Vec<SelectedFile> = order
        .into_iter()
        .filter_map(|key| chosen.remove(&key))
        .collect();
    results.sort_by_key(|f| f.file_name.to_lowercase());
    results
}
