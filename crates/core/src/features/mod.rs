//! Beat-aligned timbre features.
//!
//! Analysis reports timbre per segment, whose boundaries have nothing to do
//! with the beat grid. [`resample_features`] projects those vectors onto the
//! grid and [`timbre_whiten`] normalises the result so rows from different
//! tracks are comparable.

use serde::{Deserialize, Serialize};

use crate::{CapsuleError, Result, Track};

/// Dense row-major matrix of `f32` features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl FeatureMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Builds a matrix from equally sized rows.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = rows.iter().position(|row| row.len() != cols) {
            return Err(CapsuleError::msg(format!(
                "feature row {bad} has {} columns, expected {cols}",
                rows[bad].len()
            )));
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data: rows.into_iter().flatten().collect(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        (index < self.rows).then(|| &self.data[index * self.cols..(index + 1) * self.cols])
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        (row < self.rows && col < self.cols).then(|| self.data[row * self.cols + col])
    }

    fn row_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.data[index * self.cols..(index + 1) * self.cols]
    }

    fn column(&self, col: usize) -> impl Iterator<Item = f32> + '_ {
        (0..self.rows).map(move |row| self.data[row * self.cols + col])
    }
}

/// The marker grid features are resampled onto.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rate {
    #[default]
    Beats,
    Segments,
}

/// Produces a feature matrix aligned to the requested marker grid.
///
/// For [`Rate::Beats`] every row is the overlap-weighted mean of the timbre
/// vectors of all segments intersecting that beat. A beat no segment touches
/// gets a zero row so rows stay in 1:1 correspondence with beats.
pub fn resample_features(track: &Track, rate: Rate) -> Result<FeatureMatrix> {
    let fail = |reason: &str| CapsuleError::Features {
        track: track.name.clone(),
        reason: reason.to_string(),
    };

    if track.segments.is_empty() {
        return Err(fail("analysis has no segments"));
    }
    let cols = track.segments[0].timbre.len();
    if track.segments.iter().any(|segment| segment.timbre.len() != cols) {
        return Err(fail("segments disagree on timbre length"));
    }

    match rate {
        Rate::Segments => {
            FeatureMatrix::from_rows(track.segments.iter().map(|s| s.timbre.clone()).collect())
        }
        Rate::Beats => {
            if track.beats.is_empty() {
                return Err(fail("analysis has no beats"));
            }

            let mut matrix = FeatureMatrix::zeros(track.beats.len(), cols);
            // Segments are sorted by start; skip the ones that ended before
            // the current beat.
            let mut first = 0;
            for (row, beat) in track.beats.iter().enumerate() {
                while first < track.segments.len() && track.segments[first].end() <= beat.start {
                    first += 1;
                }

                let mut weight_sum = 0.0_f64;
                let out = matrix.row_mut(row);
                for segment in track.segments[first..]
                    .iter()
                    .take_while(|segment| segment.start < beat.end())
                {
                    let overlap = segment.end().min(beat.end()) - segment.start.max(beat.start);
                    if overlap <= 0.0 {
                        continue;
                    }
                    weight_sum += overlap;
                    for (acc, value) in out.iter_mut().zip(&segment.timbre) {
                        *acc += value * overlap as f32;
                    }
                }

                if weight_sum > 0.0 {
                    for acc in out.iter_mut() {
                        *acc /= weight_sum as f32;
                    }
                }
            }
            Ok(matrix)
        }
    }
}

/// Statistically normalises a timbre matrix. The first coefficient (overall
/// loudness) is whitened on its own; the remaining coefficients share one
/// pooled mean and deviation so their relative weights survive.
pub fn timbre_whiten(matrix: FeatureMatrix) -> FeatureMatrix {
    if matrix.rows < 2 || matrix.cols == 0 {
        return matrix;
    }

    let mut out = matrix.clone();

    let (mean, std) = mean_std(matrix.column(0));
    for row in 0..out.rows {
        out.row_mut(row)[0] = normalise(matrix.data[row * matrix.cols], mean, std);
    }

    if matrix.cols > 1 {
        let m = &matrix;
        let rest = (0..m.rows).flat_map(|row| (1..m.cols).map(move |col| m.data[row * m.cols + col]));
        let (mean, std) = mean_std(rest);
        for row in 0..out.rows {
            for value in &mut out.row_mut(row)[1..] {
                *value = normalise(*value, mean, std);
            }
        }
    }

    out
}

fn mean_std(values: impl Iterator<Item = f32>) -> (f64, f64) {
    let values: Vec<f64> = values.map(f64::from).collect();
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn normalise(value: f32, mean: f64, std: f64) -> f32 {
    let centred = f64::from(value) - mean;
    if std > f64::EPSILON {
        (centred / std) as f32
    } else {
        centred as f32
    }
}
