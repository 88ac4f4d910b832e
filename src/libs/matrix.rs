use std::collections::HashMap;
use std::fmt::Write;

/// Sparse contacts of one block, keyed by block-local `(row, col)`.
///
/// Absent cells are zero. A source may return a smaller extent when the
/// block runs into the chromosome end; [`ContactMatrix::pad`] restores it.
#[derive(Debug, Clone, Default)]
pub struct ContactMatrix {
    pub n_rows: usize,
    pub n_cols: usize,
    cells: HashMap<(usize, usize), f64>,
}

impl ContactMatrix {
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            cells: HashMap::new(),
        }
    }

    /// Cells outside the extent are ignored.
    pub fn insert(&mut self, row: usize, col: usize, value: f64) {
        if row < self.n_rows && col < self.n_cols {
            self.cells.insert((row, col), value);
        }
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.cells.get(&(row, col)).copied().unwrap_or(0.0)
    }

    /// Grows the extent to at least `n_rows` x `n_cols`; new cells are zero.
    pub fn pad(&mut self, n_rows: usize, n_cols: usize) {
        self.n_rows = self.n_rows.max(n_rows);
        self.n_cols = self.n_cols.max(n_cols);
    }

    pub fn nnz(&self) -> usize {
        self.cells.len()
    }
}

/// `{:.3f}` with trailing zeros and then a trailing dot removed.
///
/// ```
/// use waffle::libs::matrix::format_cell;
/// assert_eq!(format_cell(0.0), "0");
/// assert_eq!(format_cell(1.5), "1.5");
/// assert_eq!(format_cell(10.0), "10");
/// assert_eq!(format_cell(0.12345), "0.123");
/// ```
pub fn format_cell(value: f64) -> String {
    let mut s = String::new();
    push_cell(&mut s, value);
    s
}

fn push_cell(buf: &mut String, value: f64) {
    let start = buf.len();
    write!(buf, "{:.3}", value).unwrap();
    let trimmed = buf[start..]
        .trim_end_matches('0')
        .trim_end_matches('.')
        .len();
    buf.truncate(start + trimmed);
}

/// Dense view of a [`ContactMatrix`] holding each cell twice: as a number
/// for the statistics and as its output label.
///
/// Labels are formatted once per block and live in one string arena, so
/// overlapping windows never re-format a cell.
#[derive(Debug, Clone)]
pub struct WaffleGrid {
    n_rows: usize,
    n_cols: usize,
    values: Vec<f64>,
    arena: String,
    spans: Vec<(u32, u32)>,
}

impl WaffleGrid {
    pub fn from_contacts(matrix: &ContactMatrix) -> Self {
        let (n_rows, n_cols) = (matrix.n_rows, matrix.n_cols);
        let mut values = Vec::with_capacity(n_rows * n_cols);
        let mut arena = String::with_capacity(n_rows * n_cols * 2);
        let mut spans = Vec::with_capacity(n_rows * n_cols);

        for i in 0..n_rows {
            for j in 0..n_cols {
                let value = matrix.get(i, j);
                let start = arena.len();
                push_cell(&mut arena, value);
                values.push(value);
                spans.push((start as u32, arena.len() as u32));
            }
        }

        Self {
            n_rows,
            n_cols,
            values,
            arena,
            spans,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.n_cols + col]
    }

    pub fn label(&self, row: usize, col: usize) -> &str {
        let (start, end) = self.spans[row * self.n_cols + col];
        &self.arena[start as usize..end as usize]
    }

    /// Sub-view with top-left corner `(top, left)` and at most `size` rows
    /// and columns; clipped at the grid border.
    pub fn window(&self, top: usize, left: usize, size: usize) -> Window<'_> {
        let height = self.n_rows.saturating_sub(top).min(size);
        let width = self.n_cols.saturating_sub(left).min(size);
        Window {
            grid: self,
            top,
            left,
            height,
            width,
        }
    }
}

/// A borrowed rectangle of a [`WaffleGrid`].
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    grid: &'a WaffleGrid,
    top: usize,
    left: usize,
    height: usize,
    width: usize,
}

impl<'a> Window<'a> {
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.grid.value(self.top + row, self.left + col)
    }

    pub fn label(&self, row: usize, col: usize) -> &'a str {
        self.grid.label(self.top + row, self.left + col)
    }

    /// Row-major values.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.height).flat_map(move |i| (0..self.width).map(move |j| self.get(i, j)))
    }

    /// Row-major labels.
    pub fn labels(&self) -> impl Iterator<Item = &'a str> + '_ {
        (0..self.height).flat_map(move |i| (0..self.width).map(move |j| self.label(i, j)))
    }

    pub fn sum(&self) -> f64 {
        self.values().sum()
    }
}
