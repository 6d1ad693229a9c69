use crate::types::{LocationFix, TrackPoint};
use std::collections::VecDeque;

/// Trailing-average smoother for live fixes.
///
/// Keeps the raw positions of the last accepted fixes; a new fix is averaged
/// with them once the window is full, otherwise it passes through. Smoothed
/// output never re-enters the window.
#[derive(Clone, Debug)]
pub struct LiveSmoother {
    window: VecDeque<(f64, f64)>,
    window_size: usize,
}

impl LiveSmoother {
    /// Create a smoother averaging over `window_size` prior points (typically 5)
    pub fn new(window_size: usize) -> Self {
        LiveSmoother {
            window: VecDeque::with_capacity(window_size),
            window_size,
        }
    }

    /// Smoothed candidate for `fix`; does not modify the history.
    ///
    /// Accuracy and timestamp are carried over untouched.
    pub fn apply(&self, fix: &LocationFix) -> TrackPoint {
        let point = TrackPoint::from(*fix);
        if self.window_size == 0 || self.window.len() < self.window_size {
            return point;
        }

        let count = (self.window.len() + 1) as f64;
        let (lat_sum, lon_sum) = self
            .window
            .iter()
            .fold((fix.latitude, fix.longitude), |(lat, lon), (p_lat, p_lon)| {
                (lat + p_lat, lon + p_lon)
            });
        point.with_position(lat_sum / count, lon_sum / count)
    }

    /// Remember an accepted fix's raw position as part of the trailing window
    pub fn accept(&mut self, fix: &LocationFix) {
        if self.window_size == 0 {
            return;
        }
        self.window.push_back((fix.latitude, fix.longitude));
        while self.window.len() > self.window_size {
            self.window.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }
}

/// Centered moving average over `[i - radius, i + radius]`.
///
/// The first and last `radius` points are left as they are. Averages are
/// taken from the input positions, never from already smoothed neighbours.
pub fn smooth_centered(points: &[TrackPoint], radius: usize) -> Vec<TrackPoint> {
    let mut smoothed = points.to_vec();
    if radius == 0 || points.len() < 2 * radius + 1 {
        return smoothed;
    }

    let span = (2 * radius + 1) as f64;
    for i in radius..points.len() - radius {
        let window = &points[i - radius..=i + radius];
        let lat = window.iter().map(|p| p.latitude).sum::<f64>() / span;
        let lon = window.iter().map(|p| p.longitude).sum::<f64>() / span;
        smoothed[i] = points[i].with_position(lat, lon);
    }
    smoothed
}
