//! Tirage pondéré des morceaux de remplissage

use crate::model::Track;
use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::warn;

/// Number of fill tracks drawn when the queue is completely empty
pub const DEFAULT_FILL: usize = 6;

/// Sampling weight of a track: `(max + 1) - playcount`
///
/// Always at least 1, so every track stays reachable.
pub fn weight(playcount: u64, max_playcount: u64) -> u64 {
    (max_playcount + 1).saturating_sub(playcount).max(1)
}

/// Draws up to `k` distinct tracks, favouring the least played ones
///
/// Returns every track (in random order) when fewer than `k` exist.
pub fn sample_weighted<R: Rng + ?Sized>(
    tracks: &[Track],
    max_playcount: u64,
    k: usize,
    rng: &mut R,
) -> Vec<Track> {
    let k = k.min(tracks.len());
    if k == 0 {
        return Vec::new();
    }

    match tracks.choose_multiple_weighted(rng, k, |t| weight(t.playcount, max_playcount) as f64) {
        Ok(chosen) => chosen.cloned().collect(),
        Err(err) => {
            warn!("Weighted sampling failed ({}), falling back to uniform", err);
            tracks.choose_multiple(rng, k).cloned().collect()
        }
    }
}
