use anyhow::Result;
use clap::Command;
use constants::{ABOUT, BIN_NAME, DEFAULT_SETTINGS_FILE, NAME, VERSION};
use expanduser::expanduser;
use tracing::info;

mod cli;
mod config;
mod constants;
mod log;

pub fn main() -> Result<()> {
    let about_text = format!("{} {}\n{}", NAME, VERSION, ABOUT);
    let usage_text = format!("{} <command> [options]", BIN_NAME);
    let after_help_text = format!(
        "See '{} help <command>' for more information on a command",
        BIN_NAME
    );

    let arbor = Command::new("arbor")
        .bin_name(BIN_NAME)
        .name(NAME)
        .version(VERSION)
        .about(about_text)
        .override_usage(usage_text)
        .after_help(after_help_text)
        .args(cli::args::common_args())
        .arg_required_else_help(true)
        .subcommands(cli::builtin())
        .subcommand_required(true);

    let matches = arbor.get_matches();

    let config_file_raw = match matches.try_get_one::<String>("config") {
        Ok(config_path) => config_path.map(|s| s.as_str()),
        Err(error) => {
            fatal!("Error while parsing config file flag: {error}")
        }
    };

    let expanded_path = match expanduser(config_file_raw.unwrap_or(DEFAULT_SETTINGS_FILE)) {
        Ok(path) => path,
        Err(error) => fatal!("Error while expanding config file path: {error}"),
    };
    let Some(config_file) = expanded_path.to_str() else {
        fatal!(
            "Config path is not valid UTF-8: {}",
            expanded_path.display()
        );
    };

    // CLI values take precedence over settings.toml
    let settings = match config::Settings::new(Some(config_file)) {
        Ok(s) => s,
        Err(error) => fatal!("Failed to parse settings file: {error:?}"),
    };

    let log_level_arg = match matches.try_get_one::<String>("log_level") {
        Ok(level) => level,
        Err(error) => {
            fatal!("Error while parsing log level flag: {error}");
        }
    };
    let log_level = log_level_arg.unwrap_or(&settings.log_level);

    let _guards = log::new(log_level.as_str(), &settings.log_dir);
    info!("Initialised logger with log level {log_level}");

    match matches.subcommand() {
        Some(("coordinator", cmd)) => cli::coordinator::exec(cmd, &settings)?,
        Some(("node", cmd)) => cli::node::exec(cmd, &settings)?,
        Some(("upload", cmd)) => cli::upload::exec(cmd, &settings)?,
        Some(("download", cmd)) => cli::download::exec(cmd, &settings)?,
        _ => unreachable!(),
    }

    Ok(())
}
