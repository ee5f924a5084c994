/// Indices of local maxima in a 1-D profile.
///
/// A sample is a peak when it is strictly greater than its left neighbour and
/// the first differing sample to its right is smaller. Flat plateaus count once,
/// reported at their middle (rounded down). The first and last samples are
/// never peaks.
pub fn find_peaks(profile: &[u32]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if profile.len() < 3 {
        return peaks;
    }
    let last = profile.len() - 1;
    let mut i = 1;
    while i < last {
        if profile[i - 1] < profile[i] {
            let mut ahead = i + 1;
            while ahead < last && profile[ahead] == profile[i] {
                ahead += 1;
            }
            if profile[ahead] < profile[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Peak count of a profile that is implicitly zero beyond both ends
pub fn count_padded_peaks(profile: &[u32]) -> usize {
    let mut padded = Vec::with_capacity(profile.len() + 2);
    padded.push(0);
    padded.extend_from_slice(profile);
    padded.push(0);
    find_peaks(&padded).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_and_double_peaks() {
        assert_eq!(find_peaks(&[0, 1, 3, 1, 0]), vec![2]);
        assert_eq!(find_peaks(&[0, 4, 1, 5, 0]), vec![1, 3]);
    }

    #[test]
    fn test_plateau_counts_once() {
        assert_eq!(find_peaks(&[0, 2, 5, 5, 5, 2, 0]), vec![3]);
        assert_eq!(find_peaks(&[0, 2, 5, 5, 2]), vec![2]);
    }

    #[test]
    fn test_edges_and_shoulders_are_not_peaks() {
        assert!(find_peaks(&[5, 3, 1]).is_empty());
        assert!(find_peaks(&[0, 2, 2, 3]).is_empty());
        assert!(find_peaks(&[1, 1]).is_empty());
    }

    #[test]
    fn test_padding_exposes_edge_maxima() {
        assert_eq!(count_padded_peaks(&[4, 4, 4]), 1);
        assert_eq!(count_padded_peaks(&[3, 1, 3]), 2);
    }
}
