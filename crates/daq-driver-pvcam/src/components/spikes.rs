//! Cosmic-peak removal.
//!
//! Two independent passes:
//!
//! - [`correct_spatial`] looks along a single trace. A sample that deviates
//!   from the median of its four nearest neighbours by more than a relative
//!   threshold is replaced with that median. Narrow spikes (one or two pixels)
//!   are removed; real spectral lines, which span several pixels, survive.
//! - [`correct_sequential`] looks across repeated exposures of the same scene.
//!   Per pixel, a sample far from the cross-frame median (in units of the
//!   median absolute deviation) is replaced with the median.
//!
//! Both passes compute every median from the uncorrected input and leave
//! unflagged samples bit-identical.

use crate::config::SequentialConfig;
use daq_core::data::{FrameBatch, Trace};
use daq_core::error::{AppResult, DaqError};
use tracing::debug;

/// Neighbour offsets used for the spatial median. The sample itself is excluded,
/// and the trace is padded by two samples of edge replication on each side.
const NEIGHBOURS: [isize; 4] = [-2, -1, 1, 2];

/// Minimum number of exposures for the sequential pass.
pub const MIN_SEQUENTIAL_FRAMES: usize = 5;

/// Converts a MAD into a standard-deviation estimate for Gaussian noise.
const MAD_TO_SIGMA: f64 = 1.4826;

/// Median of `values`, reordering them in place. Returns NaN for an empty slice.
fn median_in_place(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

fn neighbour_median(samples: &[f64], index: usize) -> f64 {
    let last = samples.len() as isize - 1;
    let mut window = NEIGHBOURS.map(|offset| {
        // Edge replication: out-of-range neighbours repeat the end sample.
        let j = (index as isize + offset).clamp(0, last);
        samples[j as usize]
    });
    median_in_place(&mut window)
}

/// Spatial cosmic-peak pass over one trace.
///
/// `threshold` is the relative deviation `|(median - x) / median|` above which a
/// sample is replaced. Positions whose neighbour median is exactly zero are
/// never flagged. Returns the number of replaced samples.
pub fn correct_spatial(trace: &mut Trace, threshold: f64) -> usize {
    if trace.is_empty() {
        return 0;
    }
    let medians: Vec<f64> = (0..trace.len())
        .map(|i| neighbour_median(trace, i))
        .collect();

    let mut replaced = 0;
    for (sample, median) in trace.iter_mut().zip(medians) {
        if median != 0.0 && ((median - *sample) / median).abs() > threshold {
            *sample = median;
            replaced += 1;
        }
    }

    if replaced > 0 {
        debug!("Spatial pass replaced {} sample(s)", replaced);
    }
    replaced
}

/// Sequential cosmic-peak pass over a batch of repeated exposures.
///
/// Fails with [`DaqError::SequentialBatchTooSmall`] when the batch holds fewer
/// than [`MIN_SEQUENTIAL_FRAMES`] traces. Returns the number of replaced
/// samples across the whole batch.
pub fn correct_sequential(batch: &mut FrameBatch, config: &SequentialConfig) -> AppResult<usize> {
    let frames = batch.len();
    if frames < MIN_SEQUENTIAL_FRAMES {
        return Err(DaqError::SequentialBatchTooSmall {
            got: frames,
            min: MIN_SEQUENTIAL_FRAMES,
        });
    }

    let width = batch.trace_len();
    let traces = batch.traces_mut();
    let mut column = vec![0.0; frames];
    let mut deviations = vec![0.0; frames];
    let mut replaced = 0;

    for pixel in 0..width {
        for (slot, trace) in column.iter_mut().zip(traces.iter()) {
            *slot = trace[pixel];
        }
        // Column order is irrelevant from here on; replacement reads the traces.
        let median = median_in_place(&mut column);

        for (d, x) in deviations.iter_mut().zip(column.iter()) {
            *d = (x - median).abs();
        }
        let mad = median_in_place(&mut deviations);
        let scale = (MAD_TO_SIGMA * mad).max(config.noise_floor);
        let limit = config.sigma * scale;

        for trace in traces.iter_mut() {
            if (trace[pixel] - median).abs() > limit {
                trace[pixel] = median;
                replaced += 1;
            }
        }
    }

    if replaced > 0 {
        debug!(
            "Sequential pass replaced {} sample(s) across {} frames",
            replaced, frames
        );
    }
    Ok(replaced)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SequentialConfig {
        SequentialConfig {
            enabled: true,
            sigma: 5.0,
            noise_floor: 1.0,
        }
    }

    fn batch(rows: Vec<Vec<f64>>) -> FrameBatch {
        FrameBatch::new(rows.into_iter().map(Trace::new).collect()).unwrap()
    }

    #[test]
    fn median_of_even_window_averages_middle_pair() {
        assert_eq!(median_in_place(&mut [4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median_in_place(&mut [5.0, 1.0, 3.0]), 3.0);
    }

    #[test]
    fn spatial_removes_single_pixel_spike() {
        let mut trace = Trace::new(vec![10.0, 10.0, 100.0, 10.0, 10.0]);
        let replaced = correct_spatial(&mut trace, 0.5);
        assert_eq!(replaced, 1);
        assert_eq!(trace, Trace::new(vec![10.0; 5]));
    }

    #[test]
    fn spatial_spike_next_to_the_edge() {
        let mut trace = Trace::new(vec![20.0, 500.0, 20.0, 20.0, 20.0, 20.0]);
        assert_eq!(correct_spatial(&mut trace, 0.5), 1);
        assert_eq!(trace, Trace::new(vec![20.0; 6]));
    }

    #[test]
    fn spatial_is_idempotent_on_its_output() {
        let mut trace = Trace::new(vec![
            3.0, 4.0, 90.0, 5.0, 4.0, 3.0, 4.0, 5.0, 80.0, 4.0, 4.0, 3.0,
        ]);
        assert_eq!(correct_spatial(&mut trace, 0.5), 2);
        let once = trace.clone();
        assert_eq!(correct_spatial(&mut trace, 0.5), 0);
        assert_eq!(trace, once);
    }

    #[test]
    fn spatial_never_touches_zero_median_positions() {
        let mut trace = Trace::new(vec![0.0, 0.0, 7.0, 0.0, 0.0]);
        assert_eq!(correct_spatial(&mut trace, 0.1), 0);
        assert_eq!(trace[2], 7.0);
    }

    #[test]
    fn spatial_keeps_broad_features() {
        // A line five pixels wide is not a cosmic.
        let samples = vec![10.0, 10.0, 10.0, 50.0, 60.0, 70.0, 60.0, 50.0, 10.0, 10.0, 10.0];
        let mut trace = Trace::new(samples);
        correct_spatial(&mut trace, 0.5);
        assert_eq!(trace[5], 70.0);
        assert_eq!(trace[4], 60.0);
    }

    #[test]
    fn spatial_on_short_traces() {
        let mut empty = Trace::default();
        assert_eq!(correct_spatial(&mut empty, 0.5), 0);

        let mut single = Trace::new(vec![42.0]);
        assert_eq!(correct_spatial(&mut single, 0.5), 0);
        assert_eq!(single[0], 42.0);
    }

    #[test]
    fn sequential_leaves_identical_frames_alone() {
        let row = vec![1.0, 5.0, 1000.0, 3.0];
        let mut b = batch(vec![row.clone(); 5]);
        assert_eq!(correct_sequential(&mut b, &config()).unwrap(), 0);
        for trace in b.traces() {
            assert_eq!(&trace[..], row.as_slice());
        }
    }

    #[test]
    fn sequential_replaces_single_frame_spike() {
        let mut rows = vec![vec![10.0, 20.0, 30.0]; 5];
        rows[3][1] = 5000.0;
        let mut b = batch(rows);

        assert_eq!(correct_sequential(&mut b, &config()).unwrap(), 1);
        assert_eq!(&b.traces()[3][..], &[10.0, 20.0, 30.0]);
    }

    #[test]
    fn sequential_tolerates_noise_within_scale() {
        let rows = vec![
            vec![10.0, 100.0],
            vec![11.0, 103.0],
            vec![10.0, 98.0],
            vec![12.0, 101.0],
            vec![10.0, 99.0],
        ];
        let mut b = batch(rows.clone());
        assert_eq!(correct_sequential(&mut b, &config()).unwrap(), 0);
        for (trace, row) in b.traces().iter().zip(&rows) {
            assert_eq!(&trace[..], row.as_slice());
        }
    }

    #[test]
    fn sequential_rejects_small_batches() {
        let mut b = batch(vec![vec![1.0, 2.0]; 4]);
        assert!(matches!(
            correct_sequential(&mut b, &config()),
            Err(DaqError::SequentialBatchTooSmall { got: 4, min: 5 })
        ));
    }
}
