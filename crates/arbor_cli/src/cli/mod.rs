use anyhow::Result;
use clap::Command;

pub mod args;
pub mod coordinator;
pub mod download;
pub mod node;
pub mod upload;

pub fn builtin() -> Vec<Command> {
    vec![coordinator::cli(), node::cli(), upload::cli(), download::cli()]
}

/// Run `future` to completion on a fresh multi-threaded runtime.
pub fn block_on<F: std::future::Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}
