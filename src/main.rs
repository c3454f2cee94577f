use clap::{
    crate_description, crate_name, crate_version, Arg, ArgAction, ArgMatches, Command,
};
use colored::Colorize;
use specpath::Config;

// The CLI layer should only parse inputs and forward them to library code.
fn main() -> miette::Result<()> {
    let matches = Command::new(crate_name!())
        .about(crate_description!())
        .version(crate_version!())
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("Path to a specpath.toml")
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("archive")
                .about("Prints a spec directory or .hrx file as a single archive")
                .arg(
                    Arg::new("path")
                        .help("spec directory or .hrx archive")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("tests")
                .about("Lists every test directory below a path")
                .arg(
                    Arg::new("path")
                        .help("spec directory or .hrx archive")
                        .required(true),
                )
                .arg(
                    Arg::new("prefix")
                        .long("prefix")
                        .help("path prepended to every listed test")
                        .default_value(""),
                ),
        )
        .get_matches();

    init_logger(matches.get_flag("verbose"));

    let config = match matches.get_one::<String>("config") {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    match matches.subcommand() {
        Some(("archive", args)) => handle_archive(args, &config),
        Some(("tests", args)) => handle_tests(args, &config),
        _ => unreachable!(),
    }
}

fn init_logger(is_verbose: bool) {
    let default_level = if is_verbose { "debug" } else { "warn" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn handle_archive(args: &ArgMatches, config: &Config) -> miette::Result<()> {
    let path = args.get_one::<String>("path").expect("path required");

    let text = specpath::to_archive(path, config)?;

    print!("{text}");

    Ok(())
}

fn handle_tests(args: &ArgMatches, config: &Config) -> miette::Result<()> {
    let path = args.get_one::<String>("path").expect("path required");
    let prefix = args.get_one::<String>("prefix").expect("prefix has a default");

    let tests = specpath::list_tests(path, prefix, config)?;

    for test in &tests {
        println!("{test}");
    }

    eprintln!(
        "{} {}",
        tests.len().to_string().green(),
        "test directories".bright_blue()
    );

    Ok(())
}
