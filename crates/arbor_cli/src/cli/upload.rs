use std::path::PathBuf;

use anyhow::{Context, Result};
use arbor_client::{TransferEngine, TransferEvent};
use clap::{Arg, ArgAction, ArgMatches, Command};
use expanduser::expanduser;
use tracing::{info, warn};

use super::args;
use crate::config::Settings;

pub fn cli() -> Command {
    Command::new("upload")
        .about("Upload a file to the cluster")
        .args([
            Arg::new("path")
                .value_name("path")
                .help("File to upload")
                .required(true)
                .action(ArgAction::Set),
            Arg::new("file_id")
                .long("file-id")
                .value_name("id")
                .help("Id to store the file under, defaults to the file name")
                .action(ArgAction::Set),
        ])
        .args(args::client_args())
}

pub fn exec(args: &ArgMatches, settings: &Settings) -> Result<()> {
    let raw_path = args.get_one::<String>("path").context("Missing path")?;
    let path: PathBuf = expanduser(raw_path)?;
    let file_id = match args.get_one::<String>("file_id") {
        Some(id) => id.clone(),
        None => path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_owned)
            .with_context(|| format!("Cannot derive a file id from {}", path.display()))?,
    };
    let config = args::client_config(args, settings)?;

    let sent = super::block_on(async {
        let engine = TransferEngine::new(config).await?;
        engine
            .upload(&path, &file_id, |event| match event {
                TransferEvent::ChunkAcked {
                    chunk_id,
                    next,
                    corrupted,
                } => {
                    if corrupted {
                        warn!("{chunk_id} stored with corruption, next hop {next}");
                    } else {
                        info!("{chunk_id} stored, next hop {next}");
                    }
                }
                TransferEvent::Progress { done, total } => {
                    println!("Uploaded {done}/{total} chunks");
                }
                _ => {}
            })
            .await
    })??;

    println!("Uploaded {} as `{file_id}` ({sent} bytes)", path.display());
    Ok(())
}
