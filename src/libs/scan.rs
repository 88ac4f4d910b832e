//! Sliding the waffle over genomic blocks.

use crate::libs::decay::{peak_intensity, DecayMode, DecayScorer};
use crate::libs::matrix::{WaffleGrid, Window};
use crate::libs::record::write_record;
use crate::libs::sizes::ChromSizes;
use crate::libs::source::MatrixSource;
use anyhow::Context;
use std::io::Write;

/// Parameters shared by every block of a run.
#[derive(Debug, Clone)]
pub struct ScanParams {
    pub resolution: u64,
    /// Bins on each side of the waffle center
    pub radius: usize,
    /// Edge of the square of centers scanned per block
    pub square_size: usize,
    pub mode: DecayMode,
    /// Half-width of the peak intensity square
    pub span: usize,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            resolution: 1,
            radius: 10,
            square_size: 1000,
            mode: DecayMode::Loop,
            span: 1,
        }
    }
}

impl ScanParams {
    pub fn waffle_size(&self) -> usize {
        self.radius * 2 + 1
    }

    pub fn matrix_size(&self) -> usize {
        self.square_size + 2 * self.radius
    }
}

/// One retrieval and scan unit. `pos1`/`pos2` are the first bins of the
/// row and column ranges on `chrom`; `pos1 <= pos2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub chrom: String,
    pub pos1: usize,
    pub pos2: usize,
}

impl std::fmt::Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.pos1, self.pos2)
    }
}

/// Upper-triangle blocks of every chromosome, in reference order.
///
/// ```
/// let mut sizes = waffle::libs::sizes::ChromSizes::new();
/// sizes.insert("chr1", 250);
/// let blocks = waffle::libs::scan::blocks(&sizes, 100, 2);
/// // 3 bins, squares of 2: (0,0) (0,2) (2,2)
/// assert_eq!(blocks.len(), 3);
/// assert_eq!(blocks[1].to_string(), "chr1:0-2");
/// ```
pub fn blocks(sizes: &ChromSizes, resolution: u64, square_size: usize) -> Vec<Block> {
    let mut blocks = Vec::new();
    for (chrom, len) in sizes.iter() {
        let nbins = (len / resolution) as usize + 1;
        for pos1 in (0..nbins).step_by(square_size) {
            for pos2 in (pos1..nbins).step_by(square_size) {
                blocks.push(Block {
                    chrom: chrom.to_string(),
                    pos1,
                    pos2,
                });
            }
        }
    }
    blocks
}

/// Lazily walks the centers of one block and yields the windows worth
/// scoring.
///
/// Centers run over `[radius, square_size + radius)` in both directions.
/// Only the upper triangle (`pos1 + i <= pos2 + j`) is visited and loops
/// stop once past the chromosome end. Windows that are all zeros are
/// skipped, as are windows cut by the grid border, which a grid of
/// `matrix_size` cells never produces.
pub struct WindowScanner<'a> {
    grid: &'a WaffleGrid,
    pos1: usize,
    pos2: usize,
    nbins: usize,
    radius: usize,
    end: usize,
    i: usize,
    j: usize,
}

impl<'a> WindowScanner<'a> {
    pub fn new(
        grid: &'a WaffleGrid,
        pos1: usize,
        pos2: usize,
        nbins: usize,
        radius: usize,
        square_size: usize,
    ) -> Self {
        Self {
            grid,
            pos1,
            pos2,
            nbins,
            radius,
            end: square_size + radius,
            i: radius,
            j: radius,
        }
    }

    fn next_row(&mut self) {
        self.i += 1;
        self.j = self.radius;
    }
}

impl<'a> Iterator for WindowScanner<'a> {
    type Item = (usize, usize, Window<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        let size = self.radius * 2 + 1;

        while self.i < self.end {
            // nothing outside the chromosome
            if self.pos1 + self.i > self.nbins {
                self.i = self.end;
                break;
            }
            if self.j >= self.end {
                self.next_row();
                continue;
            }

            let (i, j) = (self.i, self.j);
            self.j += 1;

            // never cross the diagonal
            if self.pos1 + i > self.pos2 + j {
                continue;
            }
            if self.pos2 + j > self.nbins {
                self.next_row();
                continue;
            }

            let window = self.grid.window(i - self.radius, j - self.radius, size);
            if window.height() < size || window.width() < size {
                continue;
            }
            if window.sum() == 0.0 {
                continue;
            }

            return Some((i, j, window));
        }

        None
    }
}

/// Counters of one block scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub windows: usize,
    pub records: usize,
}

impl std::ops::AddAssign for ScanStats {
    fn add_assign(&mut self, other: Self) {
        self.windows += other.windows;
        self.records += other.records;
    }
}

/// Fetches, scans and scores one block, appending its records to `writer`.
///
/// `offset` is the genome-wide bin index of the chromosome start.
pub fn scan_block<S: MatrixSource + ?Sized, W: Write>(
    source: &S,
    scorer: &DecayScorer,
    params: &ScanParams,
    block: &Block,
    nbins: usize,
    offset: usize,
    writer: &mut W,
) -> anyhow::Result<ScanStats> {
    let matrix_size = params.matrix_size();
    let rows = block.pos1..nbins.min(block.pos1 + matrix_size);
    let cols = block.pos2..nbins.min(block.pos2 + matrix_size);

    let mut matrix = source
        .fetch(&block.chrom, rows, cols)
        .with_context(|| format!("failed to retrieve block {}", block))?;
    // bins past the chromosome end are empty, not missing
    matrix.pad(matrix_size, matrix_size);
    let nnz = matrix.nnz();
    let grid = WaffleGrid::from_contacts(&matrix);
    drop(matrix);

    let tpos1 = offset + block.pos1;
    let tpos2 = offset + block.pos2;

    let mut stats = ScanStats::default();
    let scanner = WindowScanner::new(
        &grid,
        block.pos1,
        block.pos2,
        nbins,
        params.radius,
        params.square_size,
    );
    for (i, j, window) in scanner {
        stats.windows += 1;
        // too sparse or flat to have a decay
        let Some(score) = scorer.score(&window) else {
            continue;
        };
        let peak = peak_intensity(&window, params.span);
        write_record(writer, tpos1 + i, tpos2 + j, score, peak, window.labels())?;
        stats.records += 1;
    }

    log::debug!(
        "Block {}: {} contacts, {} windows, {} records",
        block,
        nnz,
        stats.windows,
        stats.records
    );

    Ok(stats)
}
