//! Region filters applied between the two watershed folds.
//!
//! Each filter returns a fresh [`LabelMap`] together with the labels it removed.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::{
    algorithms::count_padded_peaks,
    types::{LabelMap, Region},
};

/// Zero every region with more than `cap` pixels
pub fn remove_large_regions(labels: &LabelMap, cap: usize) -> (LabelMap, Vec<u32>) {
    let removed: BTreeSet<u32> = labels
        .pixel_counts()
        .into_iter()
        .filter(|&(_, count)| count > cap)
        .map(|(label, _)| label)
        .collect();
    (labels.without_labels(&removed), removed.into_iter().collect())
}

/// Location of the natural break between spurious fragments and real droplets
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmallRegionCutoff {
    /// Region pixel counts, ascending
    pub sorted_counts: Vec<usize>,
    /// Index with the largest `counts[i + window] - counts[i]`
    pub gap_index: usize,
    /// `sorted_counts[gap_index]`
    pub cutoff: usize,
    /// Whether the cutoff exceeded the configured floor and was used
    pub applied: bool,
}

/// Find the gap in ascending `sorted_counts` with a forward difference over `window`.
///
/// Returns `None` when there are not more than `window` counts. Ties resolve to
/// the first index.
pub fn find_size_gap(sorted_counts: &[usize], window: usize) -> Option<(usize, usize)> {
    if window == 0 || sorted_counts.len() <= window {
        return None;
    }
    let mut best: Option<(usize, usize)> = None;
    for i in 0..sorted_counts.len() - window {
        let delta = sorted_counts[i + window].saturating_sub(sorted_counts[i]);
        if best.map_or(true, |(_, d)| delta > d) {
            best = Some((i, delta));
        }
    }
    best.map(|(index, _)| (index, sorted_counts[index]))
}

/// Adaptive small-region removal.
///
/// The cutoff is only applied when it exceeds `pixel_diff_threshold`; then every
/// region with at most `cutoff` pixels is zeroed.
pub fn remove_small_regions(
    labels: &LabelMap,
    window: usize,
    pixel_diff_threshold: usize,
) -> (LabelMap, Option<SmallRegionCutoff>, Vec<u32>) {
    let counts = labels.pixel_counts();
    let mut sorted_counts: Vec<usize> = counts.values().copied().collect();
    sorted_counts.sort_unstable();

    let Some((gap_index, cutoff)) = find_size_gap(&sorted_counts, window) else {
        return (labels.clone(), None, Vec::new());
    };
    let applied = cutoff > pixel_diff_threshold;
    let decision = SmallRegionCutoff { sorted_counts, gap_index, cutoff, applied };
    if !applied {
        return (labels.clone(), Some(decision), Vec::new());
    }

    let removed: BTreeSet<u32> = counts
        .into_iter()
        .filter(|&(_, count)| count <= cutoff)
        .map(|(label, _)| label)
        .collect();
    (labels.without_labels(&removed), Some(decision), removed.into_iter().collect())
}

/// Silhouette test: a region whose row or column chord profile has more than
/// one peak is treated as merged or non-circular.
pub fn is_polymodal(region: &Region) -> bool {
    count_padded_peaks(&region.column_profile()) > 1 || count_padded_peaks(&region.row_profile()) > 1
}

/// Zero every polymodal region
pub fn remove_artifacts(labels: &LabelMap) -> (LabelMap, Vec<u32>) {
    let removed: BTreeSet<u32> = labels
        .regions()
        .values()
        .filter(|region| is_polymodal(region))
        .map(|region| region.label)
        .collect();
    (labels.without_labels(&removed), removed.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
    use imageproc::rect::Rect;

    use crate::types::LabelBuffer;

    /// Square blocks of the given sides laid out along one row, labelled 1..
    fn blocks(sides: &[u32]) -> LabelMap {
        let width = sides.iter().map(|s| s + 2).sum::<u32>() + 2;
        let height = sides.iter().max().copied().unwrap_or(1) + 4;
        let mut buffer = LabelBuffer::new(width, height);
        let mut x = 1;
        for (i, &side) in sides.iter().enumerate() {
            draw_filled_rect_mut(&mut buffer, Rect::at(x as i32, 1).of_size(side, side), Luma([i as u32 + 1]));
            x += side + 2;
        }
        LabelMap::from_buffer(buffer)
    }

    #[test]
    fn test_only_oversized_region_removed() {
        let labels = blocks(&[10, 5, 6, 7]);
        let (cleaned, removed) = remove_large_regions(&labels, 99);
        assert_eq!(removed, vec![1]);
        assert_eq!(cleaned.labels(), vec![2, 3, 4]);
        assert_eq!(labels.region_count(), 4);
    }

    #[test]
    fn test_gap_found_at_known_index() {
        let counts = [3, 4, 4, 5, 6, 7, 300, 310, 320, 330, 340, 350, 360];
        let (index, cutoff) = find_size_gap(&counts, 5).unwrap();
        assert_eq!(index, 5);
        assert_eq!(cutoff, counts[5]);
    }

    #[test]
    fn test_gap_needs_more_counts_than_window() {
        assert!(find_size_gap(&[1, 2, 3, 4, 5], 5).is_none());
        assert!(find_size_gap(&[1, 2, 3, 4, 5, 6], 5).is_some());
    }

    #[test]
    fn test_small_regions_removed_when_cutoff_exceeds_floor() {
        let mut sides = vec![2, 2, 2, 3, 3];
        sides.extend([12, 12, 13, 13, 14, 14]);
        let labels = blocks(&sides);
        let (cleaned, cutoff, removed) = remove_small_regions(&labels, 5, 1);
        let cutoff = cutoff.unwrap();
        assert!(cutoff.applied);
        assert_eq!(cutoff.cutoff, 9);
        assert_eq!(removed, vec![1, 2, 3, 4, 5]);
        assert_eq!(cleaned.region_count(), 6);
    }

    #[test]
    fn test_small_cutoff_skipped_below_floor() {
        let mut sides = vec![2, 2, 2, 3, 3];
        sides.extend([12, 12, 13, 13, 14, 14]);
        let labels = blocks(&sides);
        let (cleaned, cutoff, removed) = remove_small_regions(&labels, 5, 50);
        assert!(!cutoff.unwrap().applied);
        assert!(removed.is_empty());
        assert_eq!(cleaned, labels);
    }

    #[test]
    fn test_dumbbell_rejected_disk_kept() {
        let mut buffer = LabelBuffer::new(120, 60);
        draw_filled_circle_mut(&mut buffer, (30, 30), 14, Luma([1]));
        draw_filled_circle_mut(&mut buffer, (80, 30), 14, Luma([1]));
        draw_filled_rect_mut(&mut buffer, Rect::at(40, 28).of_size(30, 4), Luma([1]));
        let dumbbell = LabelMap::from_buffer(buffer);

        let regions = dumbbell.regions();
        assert!(is_polymodal(&regions[&1]));

        let mut disk = LabelBuffer::new(120, 60);
        draw_filled_circle_mut(&mut disk, (60, 30), 15, Luma([2]));
        let disk = LabelMap::from_buffer(disk);
        assert!(!is_polymodal(&disk.regions()[&2]));

        let combined = LabelMap::from_fn(120, 120, |x, y| {
            if y < 60 { dumbbell.get(x, y) } else { disk.get(x, y - 60) }
        });
        let (cleaned, removed) = remove_artifacts(&combined);
        assert_eq!(removed, vec![1]);
        assert_eq!(cleaned.labels(), vec![2]);
    }
}
