//! Luma Histograms
//!
//! 256-bin intensity histograms compared by Pearson correlation.

use image::{imageops, RgbImage};

const BINS: usize = 256;

/// Min-max normalized intensity histogram of one frame
#[derive(Clone, Debug, PartialEq)]
pub struct LumaHistogram {
    bins: [f64; BINS],
}

impl LumaHistogram {
    pub fn from_frame(frame: &RgbImage) -> Self {
        let luma = imageops::grayscale(frame);

        let mut counts = [0u64; BINS];
        for pixel in luma.pixels() {
            counts[pixel.0[0] as usize] += 1;
        }

        Self::from_counts(&counts)
    }

    /// Scales counts into [0, 1]; a flat histogram maps to all zeros
    pub fn from_counts(counts: &[u64; BINS]) -> Self {
        let min = counts.iter().copied().min().unwrap_or(0) as f64;
        let max = counts.iter().copied().max().unwrap_or(0) as f64;
        let range = max - min;

        let mut bins = [0.0; BINS];
        if range > 0.0 {
            for (bin, &count) in bins.iter_mut().zip(counts.iter()) {
                *bin = (count as f64 - min) / range;
            }
        }

        Self { bins }
    }

    /// Pearson correlation in [-1, 1]
    ///
    /// Returns 1.0 when either histogram has zero variance.
    pub fn correlation(&self, other: &Self) -> f64 {
        let n = BINS as f64;
        let mean_a = self.bins.iter().sum::<f64>() / n;
        let mean_b = other.bins.iter().sum::<f64>() / n;

        let mut covariance = 0.0;
        let mut var_a = 0.0;
        let mut var_b = 0.0;
        for (a, b) in self.bins.iter().zip(other.bins.iter()) {
            let da = a - mean_a;
            let db = b - mean_b;
            covariance += da * db;
            var_a += da * da;
            var_b += db * db;
        }

        let denom = var_a * var_b;
        if denom.abs() <= f64::EPSILON {
            return 1.0;
        }
        covariance / denom.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(offset: u8) -> RgbImage {
        RgbImage::from_fn(16, 16, |x, y| {
            let v = ((x * y) as u8).wrapping_add(offset);
            Rgb([v, v, v])
        })
    }

    #[test]
    fn test_identical_frames_correlate_fully() {
        let a = LumaHistogram::from_frame(&gradient(0));
        let b = LumaHistogram::from_frame(&gradient(0));
        assert!((a.correlation(&b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_disjoint_solid_frames_correlate_negatively() {
        let black = LumaHistogram::from_frame(&RgbImage::from_pixel(4, 4, Rgb([0, 0, 0])));
        let white = LumaHistogram::from_frame(&RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])));
        assert!(black.correlation(&white) < 0.0);
    }

    #[test]
    fn test_normalization_range() {
        let mut counts = [0u64; 256];
        counts[10] = 5;
        counts[20] = 10;
        let hist = LumaHistogram::from_counts(&counts);
        assert_eq!(hist.bins[20], 1.0);
        assert_eq!(hist.bins[10], 0.5);
        assert_eq!(hist.bins[0], 0.0);
    }

    #[test]
    fn test_flat_histogram_is_degenerate() {
        let flat = LumaHistogram::from_counts(&[7u64; 256]);
        let other = LumaHistogram::from_frame(&gradient(3));
        assert_eq!(flat.correlation(&other), 1.0);
        assert_eq!(flat.correlation(&flat), 1.0);
    }
}
