//! Bounded-memory sort of waffle files by their two position columns.

use crate::libs::error::WaffleError;
use anyhow::Context;
use itertools::Itertools;
use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::{NamedTempFile, TempDir, TempPath};

/// Most runs merged at once; beyond that runs are merged in several passes.
pub const MAX_FAN_IN: usize = 128;

/// A body line with its numeric sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
struct KeyedLine {
    key: (u64, u64),
    line: Vec<u8>,
}

impl Ord for KeyedLine {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.line.cmp(&other.line))
    }
}

impl PartialOrd for KeyedLine {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Leading two tab-separated columns as unsigned integers.
fn parse_key(line: &[u8], lineno: usize) -> Result<(u64, u64), WaffleError> {
    let mut fields = line.split(|&b| b == b'\t' || b == b'\n' || b == b'\r');
    let mut next = || -> Result<u64, WaffleError> {
        let field = fields.next().unwrap_or_default();
        std::str::from_utf8(field)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| {
                WaffleError::malformed(
                    lineno,
                    format!("expected integer key, got '{}'", String::from_utf8_lossy(field)),
                )
            })
    };
    Ok((next()?, next()?))
}

/// Summary of a finished sort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortStats {
    pub lines: usize,
    pub chunks: usize,
    /// Intermediate merge passes needed to get under the fan-in
    pub merges: usize,
}

/// Sorts the body of a file in place while keeping its first
/// `header_lines` lines verbatim.
///
/// The body is cut into runs of at most `buffer_size` bytes, each sorted in
/// memory and spilled into `scratch`. At most `fan_in` runs are open at a
/// time: larger sets are merged group by group into longer runs until the
/// last merge writes a file next to the target that finally replaces it.
/// The target is never modified before the rename.
#[derive(Debug)]
pub struct ExternalSorter<'a> {
    header_lines: usize,
    buffer_size: usize,
    fan_in: usize,
    scratch: &'a TempDir,
}

impl<'a> ExternalSorter<'a> {
    pub fn new(header_lines: usize, buffer_size: usize, scratch: &'a TempDir) -> Self {
        Self {
            header_lines,
            buffer_size: buffer_size.max(1),
            fan_in: MAX_FAN_IN,
            scratch,
        }
    }

    pub fn fan_in(mut self, fan_in: usize) -> Self {
        self.fan_in = fan_in.max(2);
        self
    }

    pub fn sort_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<SortStats> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("could not open {}", path.display()))?;
        let mut reader = BufReader::new(file);

        let mut header = Vec::new();
        for found in 0..self.header_lines {
            if reader.read_until(b'\n', &mut header)? == 0 {
                return Err(WaffleError::ShortHeader {
                    expected: self.header_lines,
                    found,
                }
                .into());
            }
        }
        if !header.is_empty() && !header.ends_with(b"\n") {
            header.push(b'\n');
        }

        let mut stats = SortStats::default();
        let mut runs = self.spill_runs(&mut reader, &mut stats)?;
        stats.chunks = runs.len();
        drop(reader);

        while runs.len() > self.fan_in {
            runs = self.merge_pass(runs)?;
            stats.merges += 1;
        }

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut out = NamedTempFile::new_in(dir)
            .with_context(|| format!("could not create a temporary file in {}", dir.display()))?;
        {
            let mut writer = BufWriter::new(out.as_file_mut());
            writer.write_all(&header)?;
            merge_runs(&runs, &mut writer)?;
            writer.flush()?;
        }
        out.as_file().sync_all()?;
        out.persist(path)
            .with_context(|| format!("could not replace {}", path.display()))?;

        log::info!(
            "Sorted {} lines of {} in {} chunk(s), {} intermediate merge(s)",
            stats.lines,
            path.display(),
            stats.chunks,
            stats.merges
        );

        Ok(stats)
    }

    /// Reads the body into sorted runs on disk.
    fn spill_runs<R: BufRead>(
        &self,
        reader: &mut R,
        stats: &mut SortStats,
    ) -> anyhow::Result<Vec<TempPath>> {
        let mut runs = Vec::new();
        let mut chunk: Vec<KeyedLine> = Vec::new();
        let mut chunk_bytes = 0;
        let mut lineno = self.header_lines;

        loop {
            let mut line = Vec::new();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            lineno += 1;
            if !line.ends_with(b"\n") {
                line.push(b'\n');
            }

            let key = parse_key(&line, lineno)?;
            chunk_bytes += line.len();
            chunk.push(KeyedLine { key, line });
            stats.lines += 1;

            if chunk_bytes >= self.buffer_size {
                runs.push(self.spill(&mut chunk)?);
                chunk_bytes = 0;
            }
        }
        if !chunk.is_empty() {
            runs.push(self.spill(&mut chunk)?);
        }

        Ok(runs)
    }

    /// Writes a sorted run and closes it; only its path is kept.
    fn spill(&self, chunk: &mut Vec<KeyedLine>) -> anyhow::Result<TempPath> {
        chunk.sort_unstable();

        let mut run = NamedTempFile::new_in(self.scratch.path())?;
        {
            let mut writer = BufWriter::new(run.as_file_mut());
            for keyed in chunk.drain(..) {
                writer.write_all(&keyed.line)?;
            }
            writer.flush()?;
        }
        log::debug!("Spilled sorted run {}", run.path().display());

        Ok(run.into_temp_path())
    }

    /// Merges groups of `fan_in` runs into fewer, longer runs.
    fn merge_pass(&self, runs: Vec<TempPath>) -> anyhow::Result<Vec<TempPath>> {
        let mut merged = Vec::with_capacity(runs.len().div_ceil(self.fan_in));
        for group in runs.chunks(self.fan_in) {
            let mut run = NamedTempFile::new_in(self.scratch.path())?;
            {
                let mut writer = BufWriter::new(run.as_file_mut());
                merge_runs(group, &mut writer)?;
                writer.flush()?;
            }
            merged.push(run.into_temp_path());
        }
        log::debug!("Merged {} runs into {}", runs.len(), merged.len());

        Ok(merged)
    }
}

/// Streams lines of one sorted run.
struct RunLines {
    reader: BufReader<File>,
}

impl Iterator for RunLines {
    type Item = anyhow::Result<KeyedLine>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = Vec::new();
        match self.reader.read_until(b'\n', &mut line) {
            Ok(0) => None,
            // already validated while spilling
            Ok(_) => Some(
                parse_key(&line, 0)
                    .map(|key| KeyedLine { key, line })
                    .map_err(Into::into),
            ),
            Err(e) => Some(Err(e.into())),
        }
    }
}

/// K-way merge of sorted runs.
fn merge_runs<W: Write>(runs: &[TempPath], writer: &mut W) -> anyhow::Result<()> {
    let mut readers = Vec::with_capacity(runs.len());
    for run in runs {
        let file = File::open(run)
            .with_context(|| format!("could not reopen run {}", run.display()))?;
        readers.push(RunLines {
            reader: BufReader::new(file),
        });
    }

    // errors surface first so the merge stops on them
    let merged = readers.into_iter().kmerge_by(|a, b| match (a, b) {
        (Ok(a), Ok(b)) => a < b,
        (Err(_), _) => true,
        _ => false,
    });
    for keyed in merged {
        writer.write_all(&keyed?.line)?;
    }

    Ok(())
}

/// Number of leading lines starting with `#`.
pub fn count_header_lines<R: BufRead>(reader: R) -> anyhow::Result<usize> {
    let mut count = 0;
    for line in reader.lines() {
        if line?.starts_with('#') {
            count += 1;
        } else {
            break;
        }
    }
    Ok(count)
}
