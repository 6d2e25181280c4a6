//! Scene window partitioning.

/// A half-open `[start, end)` time span assigned to one scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Window {
    pub start: f64,
    pub end: f64,
    /// Position in the scene list handed to the builder
    pub scene: usize,
}

impl Window {
    pub fn len(&self) -> f64 {
        self.end - self.start
    }
}

/// `k`-th of `n` boundaries over `[start, start + len]`, computed from the
/// indices directly so rounding never accumulates.
fn boundary(start: f64, len: f64, k: usize, n: usize) -> f64 {
    if k >= n {
        start + len
    } else {
        start + len * k as f64 / n as f64
    }
}

/// Split `[start, end)` into `parts` equal consecutive spans.
pub(crate) fn split_evenly(start: f64, end: f64, parts: usize) -> Vec<(f64, f64)> {
    let len = end - start;
    (0..parts)
        .map(|k| (boundary(start, len, k, parts), boundary(start, len, k + 1, parts)))
        .collect()
}

/// One window per scene, all of equal length.
pub(crate) fn uniform_windows(total: f64, scene_count: usize) -> Vec<Window> {
    split_evenly(0.0, total, scene_count)
        .into_iter()
        .enumerate()
        .map(|(scene, (start, end))| Window { start, end, scene })
        .collect()
}

/// One window per transcript segment, scenes assigned round-robin.
///
/// Boundaries are clamped to be monotone within `[0, total]`: the first
/// window always starts at 0 and the last always ends at `total`.
pub(crate) fn gapless_windows(total: f64, segment_starts: &[f64], scene_count: usize) -> Vec<Window> {
    if segment_starts.is_empty() || scene_count == 0 {
        return Vec::new();
    }

    let n = segment_starts.len();
    let mut bounds = Vec::with_capacity(n + 1);
    bounds.push(0.0);
    for start in &segment_starts[1..] {
        let prev = bounds.last().copied().unwrap_or(0.0);
        let clamped = if start.is_finite() { start.clamp(prev, total) } else { prev };
        bounds.push(clamped);
    }
    bounds.push(total);

    bounds
        .windows(2)
        .enumerate()
        .map(|(i, pair)| Window {
            start: pair[0],
            end: pair[1],
            scene: i % scene_count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_windows_cover_total() {
        let windows = uniform_windows(42.3, 3);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].start, 0.0);
        assert_eq!(windows[2].end, 42.3);
        for w in &windows {
            assert!((w.len() - 14.1).abs() < 1e-9);
        }
        assert_eq!(windows[1].start, windows[0].end);
    }

    #[test]
    fn test_split_evenly_exact_end() {
        let parts = split_evenly(14.1, 28.2, 2);
        assert_eq!(parts[0].0, 14.1);
        assert_eq!(parts[1].1, 28.2);
        assert_eq!(parts[0].1, parts[1].0);
    }

    #[test]
    fn test_gapless_windows_follow_segments() {
        let windows = gapless_windows(30.0, &[0.0, 12.4], 2);
        assert_eq!(
            windows,
            vec![
                Window { start: 0.0, end: 12.4, scene: 0 },
                Window { start: 12.4, end: 30.0, scene: 1 },
            ]
        );
    }

    #[test]
    fn test_gapless_round_robin_and_clamping() {
        // first start is ignored, out-of-order and overlong starts are clamped
        let windows = gapless_windows(10.0, &[0.7, 4.0, 3.0, 12.0], 3);
        let scenes: Vec<usize> = windows.iter().map(|w| w.scene).collect();
        assert_eq!(scenes, vec![0, 1, 2, 0]);
        assert_eq!(windows[0].start, 0.0);
        assert_eq!(windows[1].len(), 0.0);
        assert_eq!(windows[2].start, 4.0);
        assert_eq!(windows[3].start, 10.0);
        assert_eq!(windows[3].end, 10.0);
    }

    #[test]
    fn test_gapless_without_segments() {
        assert!(gapless_windows(10.0, &[], 2).is_empty());
        assert!(gapless_windows(10.0, &[0.0], 0).is_empty());
    }
}
