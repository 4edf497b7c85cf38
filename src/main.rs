use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use issue_pr_linker::cancel::CancelToken;
use issue_pr_linker::cli::{normalize, Cli, EffectiveConfig};
use issue_pr_linker::error::ErrorKind;
use issue_pr_linker::linking::{Linker, RunRequest};
use issue_pr_linker::report::{self, JsonFileSink};
use issue_pr_linker::{llm, staging, util};

fn init_tracing(json: bool) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
  if json {
    builder.json().init();
  } else {
    builder.init();
  }
}

/// Print one diagnostic line and exit with the configuration status.
fn fail_config(msg: impl std::fmt::Display) -> ! {
  eprintln!("issue-pr-linker: {}", msg);
  std::process::exit(2);
}

fn run(cfg: &EffectiveConfig) -> Result<()> {
  // Phase 1: run clock and collaborators
  let now = util::effective_now(util::parse_now_override(cfg.now_override.as_deref())?);

  let client = llm::make_default_client(cfg.llm_config());
  if !client.is_enabled() {
    fail_config("LLM client not enabled; set LINKER_LLM_API_KEY or OPENAI_API_KEY");
  }
  let store = match staging::make_snapshot_store(&cfg.snapshot) {
    Ok(s) => s,
    Err(e) => fail_config(e),
  };

  // Phase 2: link
  let sink = JsonFileSink::new(cfg.out.clone());
  let linker = Linker::new(store.as_ref(), client.as_ref(), now)
    .with_workers(cfg.workers)
    .with_sink(&sink);
  let req = RunRequest {
    repo: cfg.repo.clone(),
    days: cfg.days,
    dry_run: cfg.dry_run,
  };

  let report = match linker.run(&CancelToken::new(), &req) {
    Ok(r) => r,
    Err(e) if e.kind() == ErrorKind::Configuration => fail_config(e),
    Err(e) => return Err(e.into()),
  };

  // Phase 3: dry runs print the summary instead of persisting
  if cfg.dry_run {
    println!("{}", serde_json::to_string_pretty(&report::summary(&report))?);
  }

  Ok(())
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  if cli.gen_man {
    let page = util::render_man_page::<Cli>()?;
    print!("{}", page);
    return Ok(());
  }

  let cfg = match normalize(cli) {
    Ok(c) => c,
    Err(e) => fail_config(e),
  };
  init_tracing(cfg.log_json);

  run(&cfg)
}
