//! Marker-based watershed flood by simulated immersion.
//!
//! Unlabelled pixels (marker `0`) are grown from their labelled neighbours in
//! order of increasing color difference, using one FIFO per 8-bit priority
//! level. Pixels reached from two different markers become watershed lines
//! (`-1`); the outer one-pixel frame of the image is always a line.

use std::collections::VecDeque;

use image::RgbImage;

use crate::{
    algorithms::morphology::ensure_nonempty,
    error::{DropletError, Result},
    types::{FloodMap, LabelMap, WATERSHED_LINE},
};

const IN_QUEUE: i32 = -2;
const LEVELS: usize = 256;

fn color_diff(image: &RgbImage, a: usize, b: usize) -> usize {
    let raw = image.as_raw();
    (0..3)
        .map(|c| (raw[a * 3 + c] as i32 - raw[b * 3 + c] as i32).unsigned_abs() as usize)
        .max()
        .unwrap_or(0)
}

/// Flood `markers` over `image`. Marker values must fit in an `i32`.
pub fn watershed(image: &RgbImage, markers: &LabelMap) -> Result<FloodMap> {
    ensure_nonempty(image.dimensions(), "watershed image")?;
    if image.dimensions() != markers.dimensions() {
        return Err(DropletError::dimension_mismatch(image.dimensions(), markers.dimensions()));
    }
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);

    let mut m = markers
        .as_buffer()
        .as_raw()
        .iter()
        .map(|&v| {
            i32::try_from(v).map_err(|_| DropletError::InvalidInput(format!("marker {v} exceeds i32 range")))
        })
        .collect::<Result<Vec<i32>>>()?;

    for x in 0..w {
        m[x] = WATERSHED_LINE;
        m[(h - 1) * w + x] = WATERSHED_LINE;
    }
    for y in 0..h {
        m[y * w] = WATERSHED_LINE;
        m[y * w + w - 1] = WATERSHED_LINE;
    }

    let mut queues: Vec<VecDeque<usize>> = (0..LEVELS).map(|_| VecDeque::new()).collect();
    let neighbours = |pos: usize| [pos - 1, pos + 1, pos - w, pos + w];

    // Seed the queues with every unlabelled pixel touching a basin.
    for y in 1..h.saturating_sub(1) {
        for x in 1..w.saturating_sub(1) {
            let pos = y * w + x;
            if m[pos] != 0 {
                continue;
            }
            let priority = neighbours(pos)
                .into_iter()
                .filter(|&n| m[n] > 0)
                .map(|n| color_diff(image, pos, n))
                .min();
            if let Some(priority) = priority {
                queues[priority].push_back(pos);
                m[pos] = IN_QUEUE;
            }
        }
    }

    let mut active = 0usize;
    loop {
        let Some(level) = (active..LEVELS).find(|&l| !queues[l].is_empty()) else {
            break;
        };
        active = level;
        let Some(pos) = queues[level].pop_front() else {
            break;
        };

        let mut label = 0;
        for n in neighbours(pos) {
            let t = m[n];
            if t > 0 {
                if label == 0 {
                    label = t;
                } else if t != label {
                    label = WATERSHED_LINE;
                }
            }
        }
        m[pos] = label;
        if label == WATERSHED_LINE {
            continue;
        }

        for n in neighbours(pos) {
            if m[n] == 0 {
                let priority = color_diff(image, pos, n);
                queues[priority].push_back(n);
                m[n] = IN_QUEUE;
                active = active.min(priority);
            }
        }
    }

    Ok(FloodMap::from_raw(width, height, m))
}
