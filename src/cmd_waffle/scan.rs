use clap::*;
use std::io::Write;
use waffle::libs::decay::DecayMode;
use waffle::libs::pipeline::{select_blocks, write_waffle_file};
use waffle::libs::record::OutputHeader;
use waffle::libs::scan::{blocks, ScanParams};
use waffle::libs::sizes::ChromSizes;
use waffle::libs::sort::ExternalSorter;
use waffle::libs::source::{read_badcols, TsvMatrixSource};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("scan")
        .about("Extract and score a waffle around every bin pair")
        .after_help(
            r###"
This command slides a square window (waffle) over the upper triangle of
each intra-chromosomal contact matrix and writes one line per window whose
radial decay could be scored.

Input:
* <contacts>: sparse, normalized contacts, `chrom<TAB>bin1<TAB>bin2<TAB>value`.
  Bins are at the given resolution; each pair is read as symmetric.
* <chrom.sizes>: `chrom<TAB>length`, its order is the reference order.

Output (tab-separated):
    # CHROM<TAB>name<TAB>length      (one per chromosome)
    # RESOLUTION<TAB>int
    # WAFFLE RADII<TAB>int
    # BADCOLS<TAB>comma-separated bins
    pos1  pos2  rho  pval  peak  v1,v2,...,vN

Notes:
* pos1/pos2 are genome-wide bin indices, pos1 <= pos2.
* The body is sorted by pos1 then pos2 unless --no-sort is given.
* Windows that are all zero, cut by the chromosome end, or without any
  variance in their decay are skipped.
* --chrom, --pos1 and --pos2 together restrict the scan to one block.

Examples:
1. Scan with 10-bin radii:
   waffle scan contacts.tsv chr.sizes -r 10000 -o waffles.tsv

2. Anchor-including decay, 4 threads:
   waffle scan contacts.tsv chr.sizes -r 10000 --metric no-loop -p 4 -o waffles.tsv

3. List the blocks only:
   waffle scan contacts.tsv chr.sizes -r 10000 --dry-run

"###,
        )
        .arg(
            Arg::new("contacts")
                .required(true)
                .index(1)
                .help("Sparse contact file"),
        )
        .arg(
            Arg::new("chr.sizes")
                .required(true)
                .index(2)
                .help("Chromosome sizes file"),
        )
        .arg(
            Arg::new("resolution")
                .long("resolution")
                .short('r')
                .required(true)
                .num_args(1)
                .value_parser(value_parser!(u64).range(1..))
                .help("Bin size in bp"),
        )
        .arg(
            Arg::new("radius")
                .long("radius")
                .num_args(1)
                .default_value("10")
                .value_parser(value_parser!(usize))
                .help("Number of bins around the center of a waffle"),
        )
        .arg(
            Arg::new("chunk_size")
                .long("chunk-size")
                .num_args(1)
                .default_value("1000")
                .value_parser(value_parser!(usize))
                .help("Scan the genomic matrix in squares of this many bins"),
        )
        .arg(
            Arg::new("metric")
                .long("metric")
                .num_args(1)
                .default_value("loop")
                .value_parser(["loop", "no-loop"])
                .help("Decay model"),
        )
        .arg(
            Arg::new("span")
                .long("span")
                .num_args(1)
                .default_value("1")
                .value_parser(value_parser!(usize))
                .help("Half-width of the square averaged for the peak intensity"),
        )
        .arg(
            Arg::new("badcols")
                .long("badcols")
                .num_args(1)
                .help("File of genome-wide bad bins; missing means none"),
        )
        .arg(
            Arg::new("chrom")
                .long("chrom")
                .num_args(1)
                .requires("pos1")
                .requires("pos2")
                .help("Only scan the block on this chromosome"),
        )
        .arg(
            Arg::new("pos1")
                .long("pos1")
                .num_args(1)
                .requires("chrom")
                .value_parser(value_parser!(usize))
                .help("First row bin of the block"),
        )
        .arg(
            Arg::new("pos2")
                .long("pos2")
                .num_args(1)
                .requires("chrom")
                .value_parser(value_parser!(usize))
                .help("First column bin of the block"),
        )
        .arg(
            Arg::new("dry_run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Print the blocks that would be scanned and exit"),
        )
        .arg(
            Arg::new("no_sort")
                .long("no-sort")
                .action(ArgAction::SetTrue)
                .help("Leave the body in scan order"),
        )
        .arg(
            Arg::new("tmp")
                .long("tmp")
                .num_args(1)
                .help("Directory for the sort scratch files [default: system temp]"),
        )
        .arg(
            Arg::new("buffer")
                .long("buffer")
                .num_args(1)
                .default_value("268435456")
                .value_parser(value_parser!(usize))
                .help("Bytes of body lines sorted in memory at once"),
        )
        .arg(
            Arg::new("parallel")
                .long("parallel")
                .short('p')
                .num_args(1)
                .default_value("1")
                .value_parser(value_parser!(usize))
                .help("Number of threads for parallel processing"),
        )
        .arg(
            Arg::new("outfile")
                .long("outfile")
                .short('o')
                .num_args(1)
                .default_value("waffles.tsv")
                .help("Output filename"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let contacts = args.get_one::<String>("contacts").unwrap();
    let sizes_file = args.get_one::<String>("chr.sizes").unwrap();
    let outfile = args.get_one::<String>("outfile").unwrap();

    let params = ScanParams {
        resolution: *args.get_one::<u64>("resolution").unwrap(),
        radius: *args.get_one::<usize>("radius").unwrap(),
        square_size: *args.get_one::<usize>("chunk_size").unwrap(),
        mode: args.get_one::<String>("metric").unwrap().parse::<DecayMode>()?,
        span: *args.get_one::<usize>("span").unwrap(),
    };
    if params.square_size == 0 {
        return Err(anyhow::anyhow!("--chunk-size must be positive"));
    }

    let wanted = args.get_one::<String>("chrom").map(|chrom| {
        (
            chrom.as_str(),
            *args.get_one::<usize>("pos1").unwrap(),
            *args.get_one::<usize>("pos2").unwrap(),
        )
    });

    let opt_parallel = *args.get_one::<usize>("parallel").unwrap();
    rayon::ThreadPoolBuilder::new()
        .num_threads(opt_parallel)
        .build_global()?;

    //----------------------------
    // Blocks
    //----------------------------
    let sizes = ChromSizes::from_reader(waffle::reader(sizes_file)?)?;
    let todo = select_blocks(blocks(&sizes, params.resolution, params.square_size), wanted);
    if let Some((chrom, pos1, pos2)) = wanted {
        if todo.is_empty() {
            return Err(anyhow::anyhow!(
                "{}:{}-{} is not a block of size {}",
                chrom,
                pos1,
                pos2,
                params.square_size
            ));
        }
    }

    if args.get_flag("dry_run") {
        let mut writer = waffle::writer("stdout")?;
        for block in &todo {
            writeln!(writer, "{}\t{}\t{}", block.chrom, block.pos1, block.pos2)?;
        }
        writer.flush()?;
        return Ok(());
    }

    //----------------------------
    // Scan
    //----------------------------
    let badcols = read_badcols(args.get_one::<String>("badcols").map(|s| s.as_str()))?;
    let source = TsvMatrixSource::from_reader(
        waffle::reader(contacts)?,
        &sizes,
        params.resolution,
        &badcols,
    )?;
    for chrom in sizes.names() {
        log::debug!("{}: {} contacts loaded", chrom, source.nnz(chrom));
    }

    log::info!(
        "Scanning {} block(s) of {} bins, radius {}, {} decay",
        todo.len(),
        params.square_size,
        params.radius,
        params.mode
    );

    let header = OutputHeader {
        sizes,
        resolution: params.resolution,
        radius: params.radius,
        badcols,
    };
    let path = std::path::Path::new(outfile);
    let (nheader, stats) = write_waffle_file(
        path,
        &source,
        &header,
        &params,
        &todo,
        rayon::current_num_threads(),
    )?;
    log::info!(
        "Wrote {} waffles out of {} windows to {}",
        stats.records,
        stats.windows,
        outfile
    );

    //----------------------------
    // Sort
    //----------------------------
    if !args.get_flag("no_sort") {
        let scratch = match args.get_one::<String>("tmp") {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                tempfile::Builder::new().prefix("_tmp_").tempdir_in(dir)?
            }
            None => tempfile::Builder::new().prefix("_tmp_").tempdir()?,
        };
        let buffer = *args.get_one::<usize>("buffer").unwrap();
        ExternalSorter::new(nheader, buffer, &scratch).sort_file(path)?;
    }

    Ok(())
}
