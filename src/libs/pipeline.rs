use crate::libs::decay::DecayScorer;
use crate::libs::error::WaffleError;
use crate::libs::profile::DecayProfile;
use crate::libs::record::OutputHeader;
use crate::libs::scan::{scan_block, Block, ScanParams, ScanStats};
use crate::libs::source::MatrixSource;
use anyhow::Context;
use rayon::prelude::*;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Keeps only the block starting at `pos1`/`pos2` on `chrom`, if asked to.
pub fn select_blocks(blocks: Vec<Block>, wanted: Option<(&str, usize, usize)>) -> Vec<Block> {
    match wanted {
        Some((chrom, pos1, pos2)) => blocks
            .into_iter()
            .filter(|b| b.chrom == chrom && b.pos1 == pos1 && b.pos2 == pos2)
            .collect(),
        None => blocks,
    }
}

/// Scans `blocks` and writes their records in block order.
///
/// Blocks are processed in parallel batches of `batch` blocks; each one
/// renders into its own buffer and the buffers are flushed in submission
/// order, so the output does not depend on the thread count.
pub fn scan_blocks<S: MatrixSource + ?Sized, W: Write>(
    source: &S,
    header: &OutputHeader,
    params: &ScanParams,
    blocks: &[Block],
    batch: usize,
    writer: &mut W,
) -> anyhow::Result<ScanStats> {
    let profile = DecayProfile::from_radius(params.radius)?;
    let scorer = DecayScorer::new(&profile, params.mode);

    let mut total = ScanStats::default();
    for (idx, chunk) in blocks.chunks(batch.max(1)).enumerate() {
        let rendered: Vec<(Vec<u8>, ScanStats)> = chunk
            .par_iter()
            .map(|block| -> anyhow::Result<(Vec<u8>, ScanStats)> {
                let unknown = || WaffleError::UnknownChrom(block.chrom.clone());
                let nbins = header
                    .sizes
                    .bins(&block.chrom, params.resolution)
                    .ok_or_else(unknown)?;
                let offset = header
                    .sizes
                    .offset(&block.chrom, params.resolution)
                    .ok_or_else(unknown)?;
                let mut buf = Vec::new();
                let stats = scan_block(source, &scorer, params, block, nbins, offset, &mut buf)?;
                Ok((buf, stats))
            })
            .collect::<anyhow::Result<_>>()?;

        for (buf, stats) in rendered {
            writer.write_all(&buf)?;
            total += stats;
        }
        log::debug!("Batch {} done, {} records so far", idx + 1, total.records);
    }

    Ok(total)
}

/// Writes the header and the unsorted body of a waffle file; returns the
/// number of header lines together with the scan counters.
///
/// The file is built next to `path` and only moved there once every block
/// is scanned, so a failed run leaves no partial body behind.
pub fn write_waffle_file<S: MatrixSource + ?Sized>(
    path: &Path,
    source: &S,
    header: &OutputHeader,
    params: &ScanParams,
    blocks: &[Block],
    batch: usize,
) -> anyhow::Result<(usize, ScanStats)> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).with_context(|| format!("could not create {}", dir.display()))?;
    let mut out = NamedTempFile::new_in(dir)
        .with_context(|| format!("could not create a temporary file in {}", dir.display()))?;

    let (nheader, stats) = {
        let mut writer = BufWriter::new(out.as_file_mut());
        let nheader = header.write(&mut writer)?;
        let stats = scan_blocks(source, header, params, blocks, batch, &mut writer)?;
        writer.flush()?;
        (nheader, stats)
    };
    out.persist(path)
        .with_context(|| format!("could not write {}", path.display()))?;

    Ok((nheader, stats))
}
