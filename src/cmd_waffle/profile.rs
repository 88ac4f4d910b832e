use clap::*;
use itertools::Itertools;
use std::io::Write;
use waffle::libs::profile::DecayProfile;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("profile")
        .about("Print the distance-from-center ranks of a waffle")
        .after_help(
            r###"
Prints one row of the waffle per line, tab-separated. Ranks are 1-based;
cells at the same distance from the center share their average rank.

Examples:
   waffle profile --radius 2

"###,
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
            Arg::new("outfile")
                .long("outfile")
                .short('o')
                .num_args(1)
                .default_value("stdout")
                .help("Output filename. [stdout] for screen"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    let radius = *args.get_one::<usize>("radius").unwrap();
    let mut writer = waffle::writer(args.get_one::<String>("outfile").unwrap())?;

    let profile = DecayProfile::from_radius(radius)?;
    let size = profile.size();
    for i in 0..size {
        writeln!(writer, "{}", (0..size).map(|j| profile.rank_at(i, j)).join("\t"))?;
    }
    writer.flush()?;

    Ok(())
}
