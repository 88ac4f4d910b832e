use crate::libs::error::WaffleError;
use indexmap::IndexMap;
use std::io::BufRead;

/// Chromosome lengths in bp, kept in reference order.
///
/// The order drives both the `# CHROM` header lines and the cumulative
/// genome-wide bin offsets, so a plain hash map is not enough here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChromSizes {
    len_of: IndexMap<String, u64>,
}

impl ChromSizes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later insertions of an existing name update the length in place.
    pub fn insert(&mut self, name: &str, len: u64) {
        self.len_of.insert(name.to_string(), len);
    }

    /// Reads a `chrom.sizes` file: `name<TAB>length`, one per line.
    ///
    /// ```
    /// let sizes = waffle::libs::sizes::ChromSizes::from_reader(
    ///     "chr2\t500\nchr1\t300\n".as_bytes(),
    /// ).unwrap();
    /// assert_eq!(sizes.names().collect::<Vec<_>>(), vec!["chr2", "chr1"]);
    /// ```
    pub fn from_reader<R: BufRead>(reader: R) -> anyhow::Result<Self> {
        let mut sizes = Self::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 2 {
                return Err(WaffleError::malformed(idx + 1, "expected name and length").into());
            }
            let len = fields[1].parse::<u64>().map_err(|_| {
                WaffleError::malformed(idx + 1, format!("invalid length '{}'", fields[1]))
            })?;
            sizes.insert(fields[0], len);
        }

        Ok(sizes)
    }

    pub fn len(&self) -> usize {
        self.len_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len_of.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.len_of.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.len_of.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn length(&self, chrom: &str) -> Option<u64> {
        self.len_of.get(chrom).copied()
    }

    /// Number of bins of `chrom` at `resolution`: `len / resolution + 1`.
    pub fn bins(&self, chrom: &str, resolution: u64) -> Option<usize> {
        self.length(chrom).map(|len| (len / resolution) as usize + 1)
    }

    /// Genome-wide bin index of the first bin of `chrom`.
    ///
    /// ```
    /// let mut sizes = waffle::libs::sizes::ChromSizes::new();
    /// sizes.insert("chr1", 1000);
    /// sizes.insert("chr2", 500);
    /// assert_eq!(sizes.offset("chr1", 100), Some(0));
    /// assert_eq!(sizes.offset("chr2", 100), Some(11));
    /// ```
    pub fn offset(&self, chrom: &str, resolution: u64) -> Option<usize> {
        let idx = self.len_of.get_index_of(chrom)?;
        Some(
            self.len_of
                .values()
                .take(idx)
                .map(|len| (len / resolution) as usize + 1)
                .sum(),
        )
    }

    /// Start and end (exclusive) genome-wide bins of every chromosome.
    pub fn sections(&self, resolution: u64) -> IndexMap<String, (usize, usize)> {
        let mut total = 0;
        let mut section_of = IndexMap::new();
        for (name, len) in &self.len_of {
            let bins = (len / resolution) as usize + 1;
            section_of.insert(name.clone(), (total, total + bins));
            total += bins;
        }
        section_of
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_sizes_keeps_order() {
        let input = "# comment\nchrX\t250\n\nchr1\t1000\nchr2 99\n";
        let sizes = ChromSizes::from_reader(input.as_bytes()).unwrap();

        assert_eq!(sizes.len(), 3);
        assert_eq!(
            sizes.names().collect::<Vec<_>>(),
            vec!["chrX", "chr1", "chr2"]
        );
        assert_eq!(sizes.length("chr1"), Some(1000));
        assert_eq!(sizes.length("chrY"), None);
    }

    #[test]
    fn test_read_sizes_malformed() {
        let err = ChromSizes::from_reader("chr1\tabc\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 1"));

        let err = ChromSizes::from_reader("chr1\t10\nchr2\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_bins_and_sections() {
        let mut sizes = ChromSizes::new();
        sizes.insert("chr1", 1000);
        sizes.insert("chr2", 1050);

        assert_eq!(sizes.bins("chr1", 100), Some(11));
        assert_eq!(sizes.bins("chr2", 100), Some(11));
        assert_eq!(sizes.offset("chr2", 100), Some(11));

        let sections = sizes.sections(100);
        assert_eq!(sections["chr1"], (0, 11));
        assert_eq!(sections["chr2"], (11, 22));
    }
}
