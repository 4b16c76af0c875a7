pub mod category;
pub mod cli;
pub mod command;
pub mod config;
pub mod datetime;
pub mod error;
pub mod notify;
pub mod render;
pub mod sample;
pub mod session;
pub mod shell;
pub mod store;
pub mod task;
pub mod view;

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufReader, IsTerminal};

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
    "starting taskflow"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.taskflowrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );
  if let Some(path) = cli.categories.as_ref() {
    cfg.apply_overrides([(
      "categories.file".to_string(),
      path.display().to_string()
    )]);
  }

  let categories = cfg
    .load_categories()
    .context(
      "failed to load categories"
    )?;
  let color = cfg.color()?;

  let seed = if cfg.sample_tasks()
    && !cli.no_sample
  {
    sample::sample_tasks(
      datetime::local_today(),
      Utc::now()
    )
  } else {
    vec![]
  };
  let store = store::TaskStore::with_tasks(
    seed,
    notify::ConsoleSink::new(color)
  )
  .context("failed to seed task store")?;

  let mut app = command::App::new(
    store,
    categories,
    cfg.default_category().as_deref()
  );
  let mut renderer =
    render::Renderer::new(color);

  if !cli.rest.is_empty() {
    let words = cli
      .rest
      .iter()
      .map(|arg| {
        arg.to_string_lossy().into_owned()
      })
      .collect::<Vec<_>>();
    debug!(?words, "running single command");
    if let Some(command) =
      command::Command::from_words(&words)?
    {
      shell::run_one(
        &mut app,
        &mut renderer,
        command
      )?;
    }
  } else if let Some(path) =
    cli.script.as_ref()
  {
    let file = File::open(path)
      .with_context(|| {
        format!(
          "failed to open script {}",
          path.display()
        )
      })?;
    shell::run_lines(
      &mut app,
      &mut renderer,
      BufReader::new(file),
      false
    )?;
  } else {
    let stdin = io::stdin();
    let prompt = stdin.is_terminal();
    shell::run_lines(
      &mut app,
      &mut renderer,
      stdin.lock(),
      prompt
    )?;
  }

  info!("done");
  Ok(())
}
