use image::{GrayImage, Luma};

use crate::{algorithms::morphology::ensure_nonempty, error::Result, types::BinaryMask};

const INF: f64 = 1e20;

/// Squared distance transform of a sampled function along one line
/// (Felzenszwalb & Huttenlocher lower envelope of parabolas).
fn squared_distance_1d(f: &[f64], out: &mut [f64]) {
    let n = f.len();
    let mut v = vec![0usize; n];
    let mut z = vec![0f64; n + 1];
    let mut k = 0usize;
    z[0] = -INF;
    z[1] = INF;

    let intersect = |q: usize, p: usize| {
        let (qf, pf) = (q as f64, p as f64);
        ((f[q] + qf * qf) - (f[p] + pf * pf)) / (2.0 * qf - 2.0 * pf)
    };

    for q in 1..n {
        let mut s = intersect(q, v[k]);
        while s <= z[k] {
            k -= 1;
            s = intersect(q, v[k]);
        }
        k += 1;
        v[k] = q;
        z[k] = s;
        z[k + 1] = INF;
    }

    k = 0;
    for (q, slot) in out.iter_mut().enumerate() {
        while z[k + 1] < q as f64 {
            k += 1;
        }
        let d = q as f64 - v[k] as f64;
        *slot = d * d + f[v[k]];
    }
}

/// Exact Euclidean distance from every pixel to the nearest background pixel, row-major.
///
/// Background pixels are 0. Returns `None` when the mask has no background at all.
pub fn euclidean_distances(mask: &BinaryMask) -> Result<Option<Vec<f64>>> {
    ensure_nonempty(mask.dimensions(), "distance transform input")?;
    let (width, height) = (mask.width() as usize, mask.height() as usize);
    if mask.foreground_count() == width * height {
        return Ok(None);
    }

    let mut grid: Vec<f64> = mask
        .as_image()
        .pixels()
        .map(|p| if p[0] == 0 { 0.0 } else { INF })
        .collect();

    let mut column = vec![0f64; height];
    let mut column_out = vec![0f64; height];
    for x in 0..width {
        for y in 0..height {
            column[y] = grid[y * width + x];
        }
        squared_distance_1d(&column, &mut column_out);
        for y in 0..height {
            grid[y * width + x] = column_out[y];
        }
    }

    let mut row_out = vec![0f64; width];
    for row in grid.chunks_mut(width) {
        squared_distance_1d(row, &mut row_out);
        row.copy_from_slice(&row_out);
    }

    Ok(Some(grid.into_iter().map(f64::sqrt).collect()))
}

/// Distance transform min-max normalized into `0..=255`.
///
/// A mask without background is entirely interior and maps to 255; a flat
/// distance field maps to 0.
pub fn distance_transform(mask: &BinaryMask) -> Result<GrayImage> {
    let (width, height) = mask.dimensions();
    let Some(distances) = euclidean_distances(mask)? else {
        return Ok(GrayImage::from_pixel(width, height, Luma([255])));
    };

    let (min, max) = distances
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &d| (lo.min(d), hi.max(d)));
    let range = max - min;

    Ok(GrayImage::from_fn(width, height, |x, y| {
        if range <= 0.0 {
            return Luma([0]);
        }
        let d = distances[y as usize * width as usize + x as usize];
        Luma([((d - min) / range * 255.0) as u8])
    }))
}
