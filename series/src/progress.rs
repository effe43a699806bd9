//! Progress reporting and cooperative cancellation.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The progress of a series assembly,
/// reported after each slice is copied into the volume.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SeriesProgress {
    /// fraction of the work done, from 0 to 1
    pub fraction: f64,
    /// the number of slices copied so far
    pub slices_copied: usize,
    /// the total number of slices
    pub total: usize,
}

impl SeriesProgress {
    pub(crate) fn new(slices_copied: usize, total: usize) -> Self {
        let fraction = if total == 0 {
            1.
        } else {
            slices_copied as f64 / total as f64
        };
        SeriesProgress {
            fraction,
            slices_copied,
            total,
        }
    }
}

/// A shared flag for cancelling a series assembly from another thread.
///
/// Clones of a token refer to the same flag.
#[derive(Debug, Default, Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_fraction() {
        assert_eq!(SeriesProgress::new(1, 4).fraction, 0.25);
        assert_eq!(SeriesProgress::new(4, 4).fraction, 1.);
        assert_eq!(SeriesProgress::new(0, 0).fraction, 1.);
    }

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
