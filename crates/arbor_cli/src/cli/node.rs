use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use arbor_core::topology::Cluster;
use arbor_core::NodeId;
use arbor_node::NodeConfig;
use clap::{value_parser, Arg, ArgAction, ArgGroup, ArgMatches, Command};
use expanduser::expanduser;
use tokio::task::JoinSet;
use tracing::{error, info};

use super::args;
use crate::config::Settings;
use crate::get_config_value;

pub fn cli() -> Command {
    Command::new("node")
        .about("Run one or all storage nodes")
        .args([
            Arg::new("id")
                .long("id")
                .value_name("n")
                .help("Id of the node to run")
                .value_parser(value_parser!(u16))
                .action(ArgAction::Set),
            Arg::new("all")
                .long("all")
                .help("Run every node of the cluster in this process")
                .action(ArgAction::SetTrue),
            Arg::new("store_dir_prefix")
                .long("store-dir-prefix")
                .value_name("prefix")
                .help("Prefix of each node's chunk directory, the node id is appended")
                .action(ArgAction::Set),
            Arg::new("noise_probability")
                .long("noise-probability")
                .value_name("p")
                .help("Flip each received bit with this probability")
                .value_parser(value_parser!(f64))
                .action(ArgAction::Set),
        ])
        .group(
            ArgGroup::new("target")
                .args(["id", "all"])
                .required(true),
        )
}

fn node_config(
    id: NodeId,
    cluster: &Cluster,
    settings: &Settings,
    store_dir_prefix: &str,
    noise_probability: Option<f64>,
) -> Result<NodeConfig> {
    let Some(addr) = cluster.address(id) else {
        bail!("Node {id} is not part of a {} node cluster", cluster.num_nodes());
    };

    Ok(NodeConfig {
        node_id: id,
        cluster: cluster.clone(),
        bind_addr: SocketAddr::V4(addr),
        store_dir: expanduser(format!("{store_dir_prefix}{id}"))?,
        codec: args::codec(settings)?,
        noise_probability,
    })
}

pub fn exec(args: &ArgMatches, settings: &Settings) -> Result<()> {
    let cluster = args::cluster(settings)?;
    let store_dir_prefix = get_config_value!(
        args,
        "store_dir_prefix",
        String,
        settings.node.store_dir_prefix
    );
    let noise_probability = args
        .get_one::<f64>("noise_probability")
        .copied()
        .or(settings.node.noise_probability);

    let ids: Vec<NodeId> = if args.get_flag("all") {
        (0..cluster.num_nodes() as u16).map(NodeId).collect()
    } else {
        let id = args.get_one::<u16>("id").context("Missing node id")?;
        vec![NodeId(*id)]
    };

    let configs = ids
        .into_iter()
        .map(|id| node_config(id, &cluster, settings, store_dir_prefix, noise_probability))
        .collect::<Result<Vec<_>>>()?;

    super::block_on(async move {
        let mut nodes = JoinSet::new();
        for config in configs {
            let id = config.node_id;
            info!("Starting node {id} on {}", config.bind_addr);
            nodes.spawn(async move { (id, arbor_node::serve(config).await) });
        }

        while let Some(joined) = nodes.join_next().await {
            let (id, result) = joined?;
            if let Err(err) = result {
                error!("Node {id} stopped: {err}");
                return Err(err.into());
            }
        }
        Ok::<(), anyhow::Error>(())
    })?
}
