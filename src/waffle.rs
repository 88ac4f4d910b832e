extern crate clap;
use clap::*;

mod cmd_waffle;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let app = Command::new("waffle")
        .version(crate_version!())
        .author(crate_authors!())
        .about("`waffle` - Scan contact matrices for loop-like decays")
        .propagate_version(true)
        .arg_required_else_help(true)
        .color(ColorChoice::Auto)
        .subcommand(cmd_waffle::scan::make_subcommand())
        .subcommand(cmd_waffle::sort::make_subcommand())
        .subcommand(cmd_waffle::profile::make_subcommand())
        .after_help(
            r###"Subcommands:

* scan    - Extract and score a waffle around every bin pair
* sort    - Sort a waffle file by its two position columns
* profile - Print the distance-from-center ranks of a waffle

Log verbosity follows RUST_LOG (default: info).

"###,
        );

    // Check which subcomamnd the user ran...
    match app.get_matches().subcommand() {
        Some(("scan", sub_matches)) => cmd_waffle::scan::execute(sub_matches),
        Some(("sort", sub_matches)) => cmd_waffle::sort::execute(sub_matches),
        Some(("profile", sub_matches)) => cmd_waffle::profile::execute(sub_matches),
        _ => unreachable!(),
    }?;

    Ok(())
}
