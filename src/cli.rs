use anyhow::{bail, Result};
use std::path::PathBuf;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub config: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub verbose: bool,
    pub help: bool,
}

/// Parse command-line flags (without the program name).
///
/// Supported forms:
///   toggl2youtrack
///   toggl2youtrack -c ./config.toml
///   toggl2youtrack --log-file ./sync.log -v
pub fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut parsed = CliArgs::default();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--config" => {
                i += 1;
                match args.get(i) {
                    Some(path) => parsed.config = Some(PathBuf::from(path)),
                    None => bail!("Missing value for -c/--config flag"),
                }
            }
            "--log-file" => {
                i += 1;
                match args.get(i) {
                    Some(path) => parsed.log_file = Some(PathBuf::from(path)),
                    None => bail!("Missing value for --log-file flag"),
                }
            }
            "-v" | "--verbose" => parsed.verbose = true,
            "-h" | "--help" => parsed.help = true,
            other => bail!("Unknown argument: {other}\n\nRun `toggl2youtrack --help` for usage."),
        }
        i += 1;
    }

    Ok(parsed)
}

pub fn print_help() {
    println!("toggl2youtrack — copy Toggl time entries into YouTrack work items\n");
    println!("USAGE:");
    println!("  toggl2youtrack [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -c, --config <path>  Config file (default ~/.toggl2youtrack/config.toml)");
    println!("  --log-file <path>    Append a debug log to this file");
    println!("  -v, --verbose        Debug output on stderr");
    println!("  -h, --help           Show this help");
    println!();
    println!("Credentials may also come from TOGGL_API_KEY, YOUTRACK_USERNAME and");
    println!("YOUTRACK_PASSWORD when no [[workers]] are configured.");
}
