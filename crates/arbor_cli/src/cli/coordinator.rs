use anyhow::Result;
use arbor_coordinator::CoordinatorConfig;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use tracing::info;

use super::args;
use crate::config::Settings;
use crate::get_config_value;

pub fn cli() -> Command {
    Command::new("coordinator")
        .about("Run the Arbor coordinator")
        .args([Arg::new("port")
            .long("port")
            .value_name("port")
            .help("TCP port to listen on")
            .value_parser(value_parser!(u16))
            .action(ArgAction::Set)])
}

pub fn exec(args: &ArgMatches, settings: &Settings) -> Result<()> {
    let port = *get_config_value!(args, "port", u16, settings.coordinator.port);

    let config = CoordinatorConfig {
        bind_addr: args::coordinator_addr(settings, port)?,
        cluster: args::cluster(settings)?,
    };
    info!(
        "Starting coordinator for {} nodes on {}",
        config.cluster.num_nodes(),
        config.bind_addr
    );

    super::block_on(arbor_coordinator::serve(config))??;
    Ok(())
}
