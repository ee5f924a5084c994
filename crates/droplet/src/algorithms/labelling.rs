use std::collections::HashMap;

use image::Luma;
pub use imageproc::region_labelling::Connectivity;
use imageproc::region_labelling::connected_components as label_components;

use crate::{
    algorithms::morphology::ensure_nonempty,
    error::Result,
    types::{BinaryMask, LabelMap, BACKGROUND},
};

/// Label the connected foreground components of `mask`.
///
/// Labels run `1..=count` in raster order of first appearance; `0` stays background.
pub fn connected_components(mask: &BinaryMask, connectivity: Connectivity) -> Result<(LabelMap, u32)> {
    ensure_nonempty(mask.dimensions(), "connected components input")?;
    let raw = label_components(mask.as_image(), connectivity, Luma([BACKGROUND]));

    // Compact whatever numbering the labeller produced.
    let mut lookup: HashMap<u32, u32> = HashMap::new();
    for p in raw.pixels() {
        if p[0] != 0 {
            let next = lookup.len() as u32 + 1;
            lookup.entry(p[0]).or_insert(next);
        }
    }
    let count = lookup.len() as u32;

    let labels = LabelMap::from_buffer(raw).map(|v| if v == 0 { 0 } else { lookup[&v] });
    Ok((labels, count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_separate_blobs() {
        let mask = BinaryMask::from_fn(12, 6, |x, y| (1..=3).contains(&y) && (x <= 2 || (5..=6).contains(&x) || x >= 10));
        let (labels, count) = connected_components(&mask, Connectivity::Four).unwrap();
        assert_eq!(count, 3);
        assert_eq!(labels.labels(), vec![1, 2, 3]);
        assert_eq!(labels.get(0, 1), 1);
        assert_eq!(labels.get(11, 3), 3);
    }

    #[test]
    fn test_diagonal_touch_depends_on_connectivity() {
        let mask = BinaryMask::from_fn(4, 4, |x, y| (x, y) == (1, 1) || (x, y) == (2, 2));
        assert_eq!(connected_components(&mask, Connectivity::Four).unwrap().1, 2);
        assert_eq!(connected_components(&mask, Connectivity::Eight).unwrap().1, 1);
    }

    #[test]
    fn test_empty_mask_has_no_components() {
        let (labels, count) = connected_components(&BinaryMask::new(5, 5), Connectivity::Four).unwrap();
        assert_eq!(count, 0);
        assert_eq!(labels.region_count(), 0);
    }
}
