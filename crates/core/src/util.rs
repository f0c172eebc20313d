//! Small numeric helpers shared by the pipeline stages.

/// Round to the nearest integer, halves rounding towards positive infinity.
pub fn round_half_up(x: f32) -> f32 {
    (x + 0.5).floor()
}

/// Snap `x` to the nearest multiple of `bin`.
pub fn round_to_bin(x: f32, bin: f32) -> f32 {
    round_half_up(x / bin) * bin
}

/// Smallest absolute distance from `x` to any of `refs`, with the index of
/// the first reference reaching it. `None` when `refs` is empty.
pub fn abs_min_dist(x: f32, refs: &[f32]) -> Option<(f32, usize)> {
    let mut best: Option<(f32, usize)> = None;
    for (i, r) in refs.iter().enumerate() {
        let d = (x - r).abs();
        match best {
            Some((best_d, _)) if d >= best_d => {}
            _ => best = Some((d, i)),
        }
    }
    best
}

/// Most frequent value. The mode only changes when another value's running
/// count strictly exceeds it, so the earliest value to reach the winning
/// count is returned.
pub fn mode<T: Copy + PartialEq>(values: &[T]) -> Option<T> {
    let mut mode = *values.first()?;
    let mut mode_count = 0;
    let mut counts: Vec<(T, usize)> = Vec::new();

    for &v in values {
        let count = match counts.iter_mut().find(|(seen, _)| *seen == v) {
            Some(entry) => {
                entry.1 += 1;
                entry.1
            }
            None => {
                counts.push((v, 1));
                1
            }
        };
        if v == mode {
            mode_count = count;
        } else if count > mode_count {
            mode = v;
            mode_count = count;
        }
    }

    Some(mode)
}

/// Key with the largest value; the first one wins ties.
pub fn max_by_value<'a, K, I>(items: I) -> Option<&'a K>
where
    I: IntoIterator<Item = (&'a K, f32)>,
    K: 'a + ?Sized,
{
    let mut best: Option<(&K, f32)> = None;
    for (k, v) in items {
        match best {
            Some((_, best_v)) if v <= best_v => {}
            _ => best = Some((k, v)),
        }
    }
    best.map(|(k, _)| k)
}
