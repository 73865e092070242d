use std::cmp::Ordering;

/// Local maxima of `x`, filtered by minimum `height` and minimum index `distance`.
///
/// Plateaus report their middle sample and the first/last samples are never peaks. When
/// peaks are closer than `distance`, the taller one survives (ties favour the later index).
pub fn find_peaks(x: &[f32], height: Option<f32>, distance: Option<usize>) -> Vec<usize> {
    let mut peaks = local_maxima(x);

    if let Some(min_height) = height {
        peaks.retain(|&idx| x[idx] >= min_height);
    }

    match distance {
        Some(distance) if distance > 1 && peaks.len() > 1 => {
            select_by_distance(&peaks, x, distance)
        }
        _ => peaks,
    }
}

fn local_maxima(x: &[f32]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }
    let last = x.len() - 1;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                let left = i;
                let right = ahead - 1;
                peaks.push((left + right) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

fn select_by_distance(peaks: &[usize], x: &[f32], distance: usize) -> Vec<usize> {
    let count = peaks.len();
    let mut keep = vec![true; count];

    // Stable ascending sort, visited from the back: tallest first, later index on ties.
    let mut order: Vec<usize> = (0..count).collect();
    order.sort_by(|&a, &b| {
        x[peaks[a]]
            .partial_cmp(&x[peaks[b]])
            .unwrap_or(Ordering::Equal)
    });

    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = j + 1;
        while k < count && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&peak, kept)| kept.then_some(peak))
        .collect()
}
