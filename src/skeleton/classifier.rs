use serde::Serialize;
use tracing::debug;

use crate::skeleton::intersect::intersect;
use crate::skeleton::skeleton_model::Fingerprint;
use crate::tree::UiTree;

/// Running intersection may not fall below this share of its peak.
pub const MISMATCH_RATIO: f64 = 0.6;

/// Intersections must be strictly larger than this to classify.
pub const DEFAULT_MIN_MATCH_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenScore {
    pub screen: String,
    pub size: usize,
}

/// Intersection size against every known screen, best first. Ties keep input order.
pub fn rank<'a, I>(candidate: &Fingerprint, known: I) -> Vec<ScreenScore>
where
    I: IntoIterator<Item = (&'a str, &'a Fingerprint)>,
{
    let mut scores: Vec<ScreenScore> = known
        .into_iter()
        .map(|(screen, fingerprint)| ScreenScore {
            screen: screen.to_string(),
            size: intersect(candidate, fingerprint).1,
        })
        .collect();
    scores.sort_by(|a, b| b.size.cmp(&a.size));
    scores
}

/// Known screen whose fingerprint shares the most structure with `candidate`.
///
/// An exact fingerprint match wins outright. Otherwise the largest intersection
/// wins if it is larger than `min_size`, else `None`.
pub fn classify_fingerprint<'a, I>(
    candidate: &Fingerprint,
    known: I,
    min_size: usize,
) -> Option<String>
where
    I: IntoIterator<Item = (&'a str, &'a Fingerprint)>,
{
    let known: Vec<(&str, &Fingerprint)> = known.into_iter().collect();

    let digest = candidate.digest();
    if let Some((screen, _)) = known.iter().find(|(_, fp)| fp.digest() == digest) {
        debug!(screen = %screen, "exact fingerprint match");
        return Some(screen.to_string());
    }

    let best = rank(candidate, known).into_iter().next()?;
    debug!(screen = %best.screen, size = best.size, "best fingerprint intersection");
    (best.size > min_size).then_some(best.screen)
}

pub fn classify<'a, I>(tree: &UiTree, known: I, min_size: usize) -> Option<String>
where
    I: IntoIterator<Item = (&'a str, &'a Fingerprint)>,
{
    classify_fingerprint(&tree.fingerprint(), known, min_size)
}

/// Outcome of folding several samples of one screen into a canonical fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkeletonMerge {
    pub fingerprint: Fingerprint,
    pub peak_size: usize,
    /// First sample that dragged the intersection below the mismatch ratio.
    pub mismatched: Option<usize>,
}

pub fn merge_samples(samples: &[Fingerprint]) -> SkeletonMerge {
    let Some(first) = samples.first() else {
        return SkeletonMerge {
            fingerprint: Fingerprint::empty(),
            peak_size: 0,
            mismatched: None,
        };
    };

    let mut running = first.clone();
    let mut peak = running.size();

    for (index, sample) in samples.iter().enumerate().skip(1) {
        let (merged, size) = intersect(&running, sample);
        if (size as f64) < peak as f64 * MISMATCH_RATIO {
            debug!(index, size, peak, "sample does not match the running skeleton");
            return SkeletonMerge {
                fingerprint: running,
                peak_size: peak,
                mismatched: Some(index),
            };
        }
        running = merged;
        peak = peak.max(size);
    }

    SkeletonMerge {
        fingerprint: running,
        peak_size: peak,
        mismatched: None,
    }
}
