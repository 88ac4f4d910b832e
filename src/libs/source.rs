//! Providers of normalized contact sub-matrices.

use crate::libs::error::WaffleError;
use crate::libs::matrix::ContactMatrix;
use crate::libs::sizes::ChromSizes;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::BufRead;
use std::ops::Range;

/// Anything that can hand out the contacts of an intra-chromosomal
/// rectangle of bins.
///
/// Offsets in the returned matrix are relative to `rows.start` and
/// `cols.start`; values are expected to be normalized already.
pub trait MatrixSource: Sync {
    fn fetch(
        &self,
        chrom: &str,
        rows: Range<usize>,
        cols: Range<usize>,
    ) -> anyhow::Result<ContactMatrix>;
}

/// Bad columns listed as genome-wide bin indices, comma or whitespace
/// separated. A missing file is an empty set.
pub fn read_badcols(path: Option<&str>) -> anyhow::Result<BTreeSet<usize>> {
    let mut badcols = BTreeSet::new();
    let path = match path {
        Some(p) if std::path::Path::new(p).is_file() => p,
        Some(p) => {
            log::warn!("Bad columns file {} not found, assuming none", p);
            return Ok(badcols);
        }
        None => return Ok(badcols),
    };

    let reader = crate::reader(path)?;
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.starts_with('#') {
            continue;
        }
        for field in line.split(|c: char| c == ',' || c.is_whitespace()) {
            if field.is_empty() {
                continue;
            }
            let bin = field.parse::<usize>().map_err(|_| {
                WaffleError::malformed(idx + 1, format!("invalid bad column '{}'", field))
            })?;
            badcols.insert(bin);
        }
    }

    Ok(badcols)
}

/// In-memory contacts loaded from a sparse text file
/// `chrom<TAB>bin1<TAB>bin2<TAB>value`.
///
/// Pairs are mirrored on load so any rectangle can be queried. Contacts
/// touching a bad column are dropped.
#[derive(Debug, Default)]
pub struct TsvMatrixSource {
    contacts_of: HashMap<String, BTreeMap<(usize, usize), f64>>,
}

impl TsvMatrixSource {
    pub fn from_reader<R: BufRead>(
        reader: R,
        sizes: &ChromSizes,
        resolution: u64,
        badcols: &BTreeSet<usize>,
    ) -> anyhow::Result<Self> {
        let sections = sizes.sections(resolution);
        let mut contacts_of: HashMap<String, BTreeMap<(usize, usize), f64>> = HashMap::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 4 {
                return Err(WaffleError::malformed(idx + 1, "expected 4 tab-separated fields").into());
            }
            let chrom = fields[0];
            let &(offset, end) = sections
                .get(chrom)
                .ok_or_else(|| WaffleError::UnknownChrom(chrom.to_string()))?;

            let parse_bin = |s: &str| {
                s.parse::<usize>()
                    .map_err(|_| WaffleError::malformed(idx + 1, format!("invalid bin '{}'", s)))
            };
            let bin1 = parse_bin(fields[1])?;
            let bin2 = parse_bin(fields[2])?;
            let value = fields[3].parse::<f64>().map_err(|_| {
                WaffleError::malformed(idx + 1, format!("invalid value '{}'", fields[3]))
            })?;

            if offset + bin1.max(bin2) >= end {
                return Err(WaffleError::malformed(
                    idx + 1,
                    format!("bin beyond the end of {}", chrom),
                )
                .into());
            }
            if badcols.contains(&(offset + bin1)) || badcols.contains(&(offset + bin2)) {
                continue;
            }

            let contacts = contacts_of.entry(chrom.to_string()).or_default();
            contacts.insert((bin1, bin2), value);
            contacts.insert((bin2, bin1), value);
        }

        Ok(Self { contacts_of })
    }

    pub fn nnz(&self, chrom: &str) -> usize {
        self.contacts_of.get(chrom).map_or(0, |c| c.len())
    }
}

impl MatrixSource for TsvMatrixSource {
    fn fetch(
        &self,
        chrom: &str,
        rows: Range<usize>,
        cols: Range<usize>,
    ) -> anyhow::Result<ContactMatrix> {
        let mut matrix = ContactMatrix::new(rows.len(), cols.len());

        // A chromosome without any contact yields an empty matrix
        let contacts = match self.contacts_of.get(chrom) {
            Some(c) => c,
            None => return Ok(matrix),
        };

        for row in rows.clone() {
            for (&(_, col), &value) in contacts.range((row, cols.start)..(row, cols.end)) {
                matrix.insert(row - rows.start, col - cols.start, value);
            }
        }

        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes() -> ChromSizes {
        let mut sizes = ChromSizes::new();
        sizes.insert("chr1", 1000);
        sizes.insert("chr2", 500);
        sizes
    }

    #[test]
    fn test_fetch_mirrored() {
        let input = "chr1\t2\t5\t3.5\nchr1\t4\t4\t1\n# skip\nchr2\t0\t1\t2\n";
        let source =
            TsvMatrixSource::from_reader(input.as_bytes(), &sizes(), 100, &BTreeSet::new())
                .unwrap();
        assert_eq!(source.nnz("chr1"), 3);

        let m = source.fetch("chr1", 2..6, 4..8).unwrap();
        assert_eq!((m.n_rows, m.n_cols), (4, 4));
        assert_eq!(m.get(0, 1), 3.5); // (2, 5)
        assert_eq!(m.get(2, 0), 1.0); // (4, 4)
        assert_eq!(m.nnz(), 2);

        // the mirrored pair (5, 2)
        let m = source.fetch("chr1", 5..6, 0..3).unwrap();
        assert_eq!(m.get(0, 2), 3.5);
    }

    #[test]
    fn test_badcols_masked() {
        let input = "chr1\t2\t5\t3.5\nchr2\t0\t1\t2\nchr2\t2\t3\t4\n";
        // chr2 starts at genome-wide bin 11
        let badcols: BTreeSet<usize> = [12].into_iter().collect();
        let source =
            TsvMatrixSource::from_reader(input.as_bytes(), &sizes(), 100, &badcols).unwrap();
        assert_eq!(source.nnz("chr1"), 2);
        assert_eq!(source.nnz("chr2"), 2);

        let m = source.fetch("chr2", 0..6, 0..6).unwrap();
        assert_eq!(m.get(0, 1), 0.0);
        assert_eq!(m.get(3, 2), 4.0);
    }

    #[test]
    fn test_malformed_and_unknown() {
        let err = TsvMatrixSource::from_reader(
            "chr1\t1\t2\n".as_bytes(),
            &sizes(),
            100,
            &BTreeSet::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("line 1"));

        let err = TsvMatrixSource::from_reader(
            "chrZ\t1\t2\t1.0\n".as_bytes(),
            &sizes(),
            100,
            &BTreeSet::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("chrZ"));

        let err = TsvMatrixSource::from_reader(
            "chr2\t1\t6\t1.0\n".as_bytes(),
            &sizes(),
            100,
            &BTreeSet::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("beyond"));
    }

    #[test]
    fn test_missing_badcols_file() {
        assert!(read_badcols(None).unwrap().is_empty());
        assert!(read_badcols(Some("tests/waffle/no-such-file"))
            .unwrap()
            .is_empty());
        let badcols = read_badcols(Some("tests/waffle/badcols.txt")).unwrap();
        assert_eq!(badcols.into_iter().collect::<Vec<_>>(), vec![3, 17, 40]);
    }
}
