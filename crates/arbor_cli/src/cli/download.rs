use anyhow::{Context, Result};
use arbor_client::{TransferEngine, TransferEvent};
use clap::{Arg, ArgAction, ArgMatches, Command};
use expanduser::expanduser;
use tracing::{info, warn};

use super::args;
use crate::config::Settings;

pub fn cli() -> Command {
    Command::new("download")
        .about("Download a file from the cluster")
        .args([
            Arg::new("file_id")
                .value_name("file-id")
                .help("Id the file was uploaded under")
                .required(true)
                .action(ArgAction::Set),
            Arg::new("output")
                .value_name("output")
                .help("Where to write the file")
                .required(true)
                .action(ArgAction::Set),
        ])
        .args(args::client_args())
}

pub fn exec(args: &ArgMatches, settings: &Settings) -> Result<()> {
    let file_id = args.get_one::<String>("file_id").context("Missing file id")?;
    let raw_output = args.get_one::<String>("output").context("Missing output")?;
    let output = expanduser(raw_output)?;
    let config = args::client_config(args, settings)?;

    let received = super::block_on(async {
        let engine = TransferEngine::new(config).await?;
        engine
            .download(file_id, &output, |event| match event {
                TransferEvent::ChunkReceived {
                    chunk_id,
                    corrupted,
                    len,
                    ..
                } => {
                    if corrupted {
                        warn!("{chunk_id} ({len} bytes) arrived corrupted and was repaired");
                    } else {
                        info!("{chunk_id} ({len} bytes) received");
                    }
                }
                TransferEvent::Progress { done, total } => {
                    println!("Downloaded {done}/{total} chunks");
                }
                _ => {}
            })
            .await
    })??;

    println!("Downloaded `{file_id}` to {} ({received} bytes)", output.display());
    Ok(())
}
