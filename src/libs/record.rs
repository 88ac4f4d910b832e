use crate::libs::error::WaffleError;
use crate::libs::sizes::ChromSizes;
use itertools::Itertools;
use std::collections::BTreeSet;
use std::io::{BufRead, Write};
use std::str::FromStr;

/// C-style `%.{precision}g`: scientific notation when the decimal exponent
/// is below -4 or not below `precision`, trailing zeros dropped.
///
/// ```
/// use waffle::libs::record::format_g;
/// assert_eq!(format_g(0.123456, 3), "0.123");
/// assert_eq!(format_g(-1.0, 3), "-1");
/// assert_eq!(format_g(1.234e-7, 3), "1.23e-07");
/// assert_eq!(format_g(0.0, 3), "0");
/// ```
pub fn format_g(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let precision = precision.max(1);
    let sci = format!("{:.*e}", precision - 1, value);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp < -4 || exp >= precision as i32 {
        let mantissa = strip_zeros(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    } else {
        let decimals = (precision as i32 - 1 - exp) as usize;
        strip_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn strip_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// One scored waffle, a body line of the output file.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub pos1: usize,
    pub pos2: usize,
    pub rho: f64,
    pub pval: f64,
    pub peak: f64,
    /// Row-major cell values, as stored in the file
    pub matrix: Vec<f64>,
}

impl FromStr for ScoredRecord {
    type Err = WaffleError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        if fields.len() != 6 {
            return Err(WaffleError::InvalidRecord(format!(
                "expected 6 fields, found {}",
                fields.len()
            )));
        }

        let bad = |what: &str, s: &str| WaffleError::InvalidRecord(format!("{} '{}'", what, s));
        let pos1 = fields[0].parse().map_err(|_| bad("pos1", fields[0]))?;
        let pos2 = fields[1].parse().map_err(|_| bad("pos2", fields[1]))?;
        let rho = fields[2].parse().map_err(|_| bad("rho", fields[2]))?;
        let pval = fields[3].parse().map_err(|_| bad("pval", fields[3]))?;
        let peak = fields[4].parse().map_err(|_| bad("peak", fields[4]))?;
        let matrix = fields[5]
            .split(',')
            .map(|v| v.parse::<f64>().map_err(|_| bad("cell", v)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            pos1,
            pos2,
            rho,
            pval,
            peak,
            matrix,
        })
    }
}

/// Writes one body line. `cells` are the already formatted labels of the
/// window, so stats and matrix come from the same grid.
pub fn write_record<'a, W: Write>(
    writer: &mut W,
    pos1: usize,
    pos2: usize,
    (rho, pval): (f64, f64),
    peak: f64,
    cells: impl Iterator<Item = &'a str>,
) -> std::io::Result<()> {
    writeln!(
        writer,
        "{}\t{}\t{}\t{}\t{:.3}\t{}",
        pos1,
        pos2,
        format_g(rho, 3),
        format_g(pval, 3),
        peak,
        cells.format(",")
    )
}

/// The fixed lines at the top of a waffle file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputHeader {
    pub sizes: ChromSizes,
    pub resolution: u64,
    pub radius: usize,
    pub badcols: BTreeSet<usize>,
}

impl OutputHeader {
    /// Lines [`OutputHeader::write`] emits; the sort stage relies on it.
    pub fn line_count(&self) -> usize {
        self.sizes.len() + 3
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<usize> {
        for (name, len) in self.sizes.iter() {
            writeln!(writer, "# CHROM\t{}\t{}", name, len)?;
        }
        writeln!(writer, "# RESOLUTION\t{}", self.resolution)?;
        writeln!(writer, "# WAFFLE RADII\t{}", self.radius)?;
        writeln!(writer, "# BADCOLS\t{}", self.badcols.iter().join(","))?;

        Ok(self.line_count())
    }

    /// Parses the header back, leaving the reader at the first body line.
    pub fn read<R: BufRead>(reader: &mut R) -> anyhow::Result<Self> {
        let mut header = Self::default();
        let mut lineno = 0;

        loop {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                return Err(WaffleError::malformed(lineno, "header ended before BADCOLS").into());
            }
            lineno += 1;

            let fields: Vec<&str> = line.trim_end_matches(['\n', '\r']).split('\t').collect();
            let bad = || WaffleError::malformed(lineno, format!("invalid header line '{}'", line.trim_end()));
            match fields[0] {
                "# CHROM" if fields.len() == 3 => {
                    let len = fields[2].parse().map_err(|_| bad())?;
                    header.sizes.insert(fields[1], len);
                }
                "# RESOLUTION" if fields.len() == 2 => {
                    header.resolution = fields[1].parse().map_err(|_| bad())?;
                }
                "# WAFFLE RADII" if fields.len() == 2 => {
                    header.radius = fields[1].parse().map_err(|_| bad())?;
                }
                "# BADCOLS" if fields.len() == 2 => {
                    for col in fields[1].split(',').filter(|s| !s.is_empty()) {
                        header.badcols.insert(col.parse().map_err(|_| bad())?);
                    }
                    return Ok(header);
                }
                _ => return Err(bad().into()),
            }
        }
    }
}
