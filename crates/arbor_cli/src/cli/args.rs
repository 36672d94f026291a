use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use arbor_client::ClientConfig;
use arbor_core::codec::CodecKind;
use arbor_core::topology::{Cluster, NodeDirectory};
use clap::{value_parser, Arg, ArgAction, ArgMatches};

use crate::config::Settings;
use crate::get_config_value;

pub fn common_args() -> Vec<Arg> {
    vec![
        Arg::new("config")
            .long("config")
            .value_name("file")
            .help("Path to the settings file")
            .global(true)
            .action(ArgAction::Set),
        Arg::new("log_level")
            .long("log-level")
            .value_name("level")
            .help("Log level: TRACE, DEBUG, INFO, WARN or ERROR")
            .global(true)
            .action(ArgAction::Set),
    ]
}

/// Arguments shared by the transfer subcommands.
pub fn client_args() -> Vec<Arg> {
    vec![Arg::new("ack_timeout_ms")
        .long("ack-timeout-ms")
        .value_name("ms")
        .help("Time to wait for each node reply, 0 waits forever")
        .value_parser(value_parser!(u64))
        .action(ArgAction::Set)]
}

/// Build the static cluster layout from the settings.
pub fn cluster(settings: &Settings) -> Result<Cluster> {
    let ip: Ipv4Addr = settings
        .cluster
        .node_ip
        .parse()
        .with_context(|| format!("Invalid node ip `{}`", settings.cluster.node_ip))?;
    let directory = NodeDirectory::Contiguous {
        ip,
        base_port: settings.cluster.base_port,
    };

    Ok(Cluster::new(settings.cluster.num_nodes, &directory)?)
}

pub fn codec(settings: &Settings) -> Result<CodecKind> {
    settings
        .codec
        .kind
        .parse::<CodecKind>()
        .map_err(|err: String| anyhow!(err))
}

/// Resolve the coordinator's address, with an optional port override.
pub fn coordinator_addr(settings: &Settings, port: u16) -> Result<SocketAddr> {
    let host = settings.coordinator.host.as_str();
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("Failed to resolve coordinator host `{host}`"))?
        .next()
        .ok_or_else(|| anyhow!("Coordinator host `{host}` has no address"))
}

pub fn ack_timeout(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

pub fn client_config(args: &ArgMatches, settings: &Settings) -> Result<ClientConfig> {
    let ack_timeout_ms = *get_config_value!(args, "ack_timeout_ms", u64, settings.client.ack_timeout_ms);

    Ok(ClientConfig {
        coordinator_addr: coordinator_addr(settings, settings.coordinator.port)?,
        codec: codec(settings)?,
        ack_timeout: ack_timeout(ack_timeout_ms),
        ..ClientConfig::default()
    })
}
