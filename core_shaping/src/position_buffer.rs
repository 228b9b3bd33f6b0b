use std::collections::VecDeque;

use serde::Serialize;

use crate::error::{ShapingError, ShapingResult};

/// Cells are clipped to this share of all samples.
pub const HEAT_CELL_CEILING: f64 = 0.25;

/// Largest grid, in cells, a heat matrix may allocate.
pub const MAX_HEAT_MATRIX_CELLS: usize = 1 << 24;

/// Rolling window of visited positions with lifetime bounds.
///
/// Bounds start at the origin and only ever widen; evicting a sample does not
/// shrink them.
#[derive(Debug, Clone)]
pub struct PositionBuffer {
    positions: VecDeque<(f64, f64)>,
    buffer_size: usize,
    min: (f64, f64),
    max: (f64, f64),
}

impl PositionBuffer {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            positions: VecDeque::with_capacity(buffer_size.min(4096)),
            buffer_size: buffer_size.max(1),
            min: (0.0, 0.0),
            max: (0.0, 0.0),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn bounds(&self) -> ((f64, f64), (f64, f64)) {
        (self.min, self.max)
    }

    pub fn positions(&self) -> impl Iterator<Item = &(f64, f64)> {
        self.positions.iter()
    }

    pub fn record_position(&mut self, position: (f64, f64)) {
        self.positions.push_back(position);

        self.min.0 = self.min.0.min(position.0);
        self.min.1 = self.min.1.min(position.1);
        self.max.0 = self.max.0.max(position.0);
        self.max.1 = self.max.1.max(position.1);

        if self.positions.len() > self.buffer_size {
            self.positions.pop_front();
        }
    }

    /// Occupancy grid of `size = (rows, cols)`, indexed by scaled x then y.
    ///
    /// Returns an all-zero grid when there are no samples or when either axis
    /// has collapsed (`min == max`).
    pub fn get_position_heat_matrix(&self, size: (usize, usize)) -> ShapingResult<HeatMatrix> {
        let (rows, cols) = size;
        let mut matrix = HeatMatrix::zeros(rows, cols)?;
        let span_x = self.max.0 - self.min.0;
        let span_y = self.max.1 - self.min.1;
        if self.positions.is_empty() || span_x <= 0.0 || span_y <= 0.0 {
            return Ok(matrix);
        }

        for (x, y) in &self.positions {
            let row = scale(*x, self.min.0, span_x, rows);
            let col = scale(*y, self.min.1, span_y, cols);
            matrix.cells[row * cols + col] += 1.0;
        }

        let samples = self.positions.len() as f64;
        for cell in &mut matrix.cells {
            *cell = (*cell / samples).clamp(0.0, HEAT_CELL_CEILING);
        }
        Ok(matrix)
    }
}

fn scale(value: f64, min: f64, span: f64, cells: usize) -> usize {
    let scaled = ((value - min) / span * (cells - 1) as f64).floor();
    (scaled.max(0.0) as usize).min(cells - 1)
}

/// Row-major 2-D grid of normalized visit frequencies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatMatrix {
    rows: usize,
    cols: usize,
    cells: Vec<f64>,
}

impl HeatMatrix {
    /// Both axes must be non-zero and the grid at most
    /// [`MAX_HEAT_MATRIX_CELLS`] cells.
    pub fn zeros(rows: usize, cols: usize) -> ShapingResult<Self> {
        let cells = rows
            .checked_mul(cols)
            .filter(|cells| (1..=MAX_HEAT_MATRIX_CELLS).contains(cells))
            .ok_or(ShapingError::InvalidHeatMatrixSize { rows, cols })?;
        Ok(Self {
            rows,
            cols,
            cells: vec![0.0; cells],
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.cells[row * self.cols + col]
    }

    pub fn cells(&self) -> &[f64] {
        &self.cells
    }

    pub fn sum(&self) -> f64 {
        self.cells.iter().sum()
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.cells
            .chunks(self.cols)
            .map(|row| row.to_vec())
            .collect()
    }

    /// Cell-wise mean of same-shaped matrices collected from several
    /// environments. `None` when `matrices` is empty or shapes disagree.
    pub fn average(matrices: &[HeatMatrix]) -> Option<HeatMatrix> {
        let first = matrices.first()?;
        if matrices
            .iter()
            .any(|matrix| matrix.rows != first.rows || matrix.cols != first.cols)
        {
            return None;
        }

        let mut result = HeatMatrix {
            rows: first.rows,
            cols: first.cols,
            cells: vec![0.0; first.cells.len()],
        };
        for matrix in matrices {
            for (total, value) in result.cells.iter_mut().zip(&matrix.cells) {
                *total += value;
            }
        }
        let count = matrices.len() as f64;
        for cell in &mut result.cells {
            *cell /= count;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eviction_is_fifo_and_bounded() {
        let mut buffer = PositionBuffer::new(3);
        for step in 0..5 {
            buffer.record_position((step as f64, 0.0));
            assert!(buffer.len() <= 3);
        }
        let kept: Vec<f64> = buffer.positions().map(|(x, _)| *x).collect();
        assert_eq!(kept, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn bounds_are_not_retracted_after_eviction() {
        let mut buffer = PositionBuffer::new(1);
        buffer.record_position((-50.0, 80.0));
        buffer.record_position((3.0, 4.0));
        assert_eq!(buffer.bounds(), ((-50.0, 0.0), (3.0, 80.0)));
    }

    #[test]
    fn heat_matrix_bins_and_clips() {
        let mut buffer = PositionBuffer::new(100);
        for _ in 0..6 {
            buffer.record_position((10.0, 10.0));
        }
        buffer.record_position((0.0, 0.0));
        buffer.record_position((5.0, 5.0));

        let matrix = buffer.get_position_heat_matrix((3, 3)).unwrap();
        // 6/8 of the samples land on the far corner, clipped down.
        assert_eq!(matrix.get(2, 2), HEAT_CELL_CEILING);
        assert_eq!(matrix.get(0, 0), 1.0 / 8.0);
        assert_eq!(matrix.get(1, 1), 1.0 / 8.0);
        assert!(matrix.cells().iter().all(|cell| (0.0..=0.25).contains(cell)));
        assert!(matrix.sum() <= 0.25 * 9.0);
    }

    #[test]
    fn collapsed_axis_yields_zero_grid() {
        let mut buffer = PositionBuffer::new(10);
        assert_eq!(
            buffer.get_position_heat_matrix((4, 4)).unwrap(),
            HeatMatrix::zeros(4, 4).unwrap()
        );

        buffer.record_position((5.0, 0.0));
        buffer.record_position((7.0, 0.0));
        let matrix = buffer.get_position_heat_matrix((4, 4)).unwrap();
        assert_eq!(matrix.sum(), 0.0);
        assert!(matrix.cells().iter().all(|cell| cell.is_finite()));
    }

    #[test]
    fn zero_sized_matrix_is_rejected() {
        let buffer = PositionBuffer::new(10);
        assert_eq!(
            buffer.get_position_heat_matrix((0, 8)).unwrap_err(),
            ShapingError::InvalidHeatMatrixSize { rows: 0, cols: 8 }
        );
    }

    #[test]
    fn oversized_matrix_is_rejected() {
        let mut buffer = PositionBuffer::new(10);
        buffer.record_position((1.0, 1.0));
        assert_eq!(
            buffer.get_position_heat_matrix((usize::MAX, 2)).unwrap_err(),
            ShapingError::InvalidHeatMatrixSize {
                rows: usize::MAX,
                cols: 2
            }
        );
        assert!(buffer.get_position_heat_matrix((1 << 20, 1 << 20)).is_err());
    }

    #[test]
    fn single_cell_matrix_holds_the_ceiling() {
        let mut buffer = PositionBuffer::new(10);
        buffer.record_position((1.0, 1.0));
        buffer.record_position((2.0, 3.0));
        let matrix = buffer.get_position_heat_matrix((1, 1)).unwrap();
        assert_eq!(matrix.cells(), &[HEAT_CELL_CEILING]);
    }

    #[test]
    fn average_requires_matching_shapes() {
        let mut a = HeatMatrix::zeros(2, 2).unwrap();
        a.cells[0] = 0.2;
        let b = HeatMatrix::zeros(2, 2).unwrap();
        let averaged = HeatMatrix::average(&[a, b]).unwrap();
        assert_eq!(averaged.get(0, 0), 0.1);
        assert_eq!(averaged.to_rows(), vec![vec![0.1, 0.0], vec![0.0, 0.0]]);

        let mismatched = [
            HeatMatrix::zeros(2, 2).unwrap(),
            HeatMatrix::zeros(3, 2).unwrap(),
        ];
        assert!(HeatMatrix::average(&mismatched).is_none());
        assert!(HeatMatrix::average(&[]).is_none());
    }
}
