pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod event;
pub mod filter;
pub mod goal;
pub mod render;
pub mod settings;
pub mod task;

use std::ffi::OsString;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting focus CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.focusrc.as_deref()
  )?;
  cfg
    .apply_overrides(
      pre.rc_overrides.into_iter().chain(
        cli
          .rc_overrides
          .into_iter()
          .map(|kv| (kv.key, kv.value))
      )
    )
    .context("invalid configuration override")?;

  let data_dir = cfg
    .data_dir(cli.data.as_deref())
    .context(
      "failed to resolve data \
       directory"
    )?;

  let mut store =
    datastore::DataStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;

  debug!(data_dir = %store.data_dir().display(), "datastore ready");

  let mut renderer =
    render::Renderer::new(&cfg);

  commands::dispatch(
    &mut store,
    &cfg,
    &mut renderer,
    cli.command,
    Utc::now()
  )?;

  info!("done");
  Ok(())
}
