use clap::*;
use waffle::libs::sort::{count_header_lines, ExternalSorter};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("sort")
        .about("Sort a waffle file by its two position columns")
        .after_help(
            r###"
The file is sorted in place: the header lines are kept as they are and the
body is ordered numerically by column 1, then column 2.

Sorting works on bounded memory. Runs of --buffer bytes are sorted and
spilled into a scratch directory under --tmp, then merged. The original
file is only replaced once the sorted copy is complete.

Examples:
1. Sort, counting the leading `#` lines as header:
   waffle sort waffles.tsv

2. Explicit header length and a small memory budget:
   waffle sort waffles.tsv --header 28 --buffer 1000000 --tmp /scratch

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .index(1)
                .help("Waffle file to sort in place"),
        )
        .arg(
            Arg::new("header")
                .long("header")
                .num_args(1)
                .value_parser(value_parser!(usize))
                .help("Number of header lines [default: leading lines starting with #]"),
        )
        .arg(
            Arg::new("tmp")
                .long("tmp")
                .num_args(1)
                .help("Directory for the scratch files [default: system temp]"),
        )
        .arg(
            Arg::new("buffer")
                .long("buffer")
                .num_args(1)
                .default_value("268435456")
                .value_parser(value_parser!(usize))
                .help("Bytes of body lines sorted in memory at once"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    let infile = args.get_one::<String>("infile").unwrap();
    let buffer = *args.get_one::<usize>("buffer").unwrap();

    let nheader = match args.get_one::<usize>("header") {
        Some(n) => *n,
        None => count_header_lines(waffle::reader(infile)?)?,
    };

    let scratch = match args.get_one::<String>("tmp") {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            tempfile::Builder::new().prefix("_tmp_").tempdir_in(dir)?
        }
        None => tempfile::Builder::new().prefix("_tmp_").tempdir()?,
    };

    ExternalSorter::new(nheader, buffer, &scratch).sort_file(infile)?;

    Ok(())
}
