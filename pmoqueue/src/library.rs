//! Synchronisation du catalogue avec le répertoire musical
//!
//! Le répertoire est plat : chaque fichier non caché est un morceau,
//! identifié dans le catalogue par son nom de fichier.

use crate::catalog::Catalog;
use crate::model::{NewTrack, Track};
use crate::scheduler::insert_unique;
use crate::{Error, Result};
use lofty::{config::ParseOptions, prelude::*, probe::Probe};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Tags lus dans un fichier audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    pub artist: String,
    pub title: String,
    pub duration_secs: u64,
}

/// Outcome of a library reload, as file names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReloadReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Unreadable, untagged or duplicate files
    pub rejected: Vec<String>,
}

/// Reads artist, title and duration from an audio file
///
/// Files without both an artist and a title are rejected.
pub fn read_metadata(path: &Path) -> Result<TrackMetadata> {
    let metadata_error = |reason: String| Error::Metadata {
        path: path.display().to_string(),
        reason,
    };

    let tagged_file = Probe::open(path)
        .and_then(|probe| probe.options(ParseOptions::new()).read())
        .map_err(|e| metadata_error(e.to_string()))?;

    let duration_secs = tagged_file.properties().duration().as_secs();
    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
        .ok_or_else(|| metadata_error("no tags".to_string()))?;

    let artist = tag
        .artist()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| metadata_error("missing artist".to_string()))?;
    let title = tag
        .title()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| metadata_error("missing title".to_string()))?;

    Ok(TrackMetadata {
        artist,
        title,
        duration_secs,
    })
}

/// Full path of a track's audio file
pub fn track_path(music_dir: &Path, track: &Track) -> PathBuf {
    music_dir.join(&track.filename)
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn list_audio_files(music_dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in WalkDir::new(music_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            warn!("Skipping non UTF-8 file name {:?}", entry.file_name());
            continue;
        };
        if !is_hidden(name) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Adds new files to the catalog and deletes tracks whose file is gone
pub fn reload_library(catalog: &mut dyn Catalog, music_dir: &Path) -> Result<ReloadReport> {
    let files = list_audio_files(music_dir)?;
    let mut report = ReloadReport::default();

    for name in &files {
        if catalog.find_track_by_filename(name)?.is_some() {
            continue;
        }
        let meta = match read_metadata(&music_dir.join(name)) {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Rejecting {}: {}", name, e);
                report.rejected.push(name.clone());
                continue;
            }
        };
        let (track, created) = insert_unique(
            catalog,
            NewTrack {
                filename: name.clone(),
                artist: meta.artist,
                title: meta.title,
                duration_secs: meta.duration_secs,
            },
        )?;
        if created {
            debug!(track_id = %track.id, "Added {}", track.display_title());
            report.added.push(name.clone());
        } else {
            warn!(
                "Rejecting {}: duplicate of {} ({})",
                name,
                track.filename,
                track.display_title()
            );
            report.rejected.push(name.clone());
        }
    }

    let present: HashSet<&str> = files.iter().map(String::as_str).collect();
    for track in catalog.list_tracks()? {
        if !present.contains(track.filename.as_str()) {
            catalog.delete_track(&track.id)?;
            debug!(track_id = %track.id, "Removed {}", track.filename);
            report.removed.push(track.filename);
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_files() {
        assert!(is_hidden(".DS_Store"));
        assert!(!is_hidden("song.ogg"));
    }

    #[test]
    fn test_garbage_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.ogg");
        std::fs::write(&path, b"definitely not audio").unwrap();
        assert!(matches!(read_metadata(&path), Err(Error::Metadata { .. })));
    }
}
