// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result};
use config::Config;
use runtime::{OfflineRuntime, StoreRuntime};
use std::env;
use std::path::{Path, PathBuf};
use stockpile_app::AppState;
use stockpile_db::Store;
use stockpile_remote::StoreCredentials;
use stockpile_testkit::ProductFaker;
use tracing::{info, warn};

const DEMO_SEED: u64 = 42;
const DEMO_PRODUCTS: usize = 24;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `stockpile --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;
    let ui_settings = config.ui_settings()?;
    let _log_guard = logging::init(&config)?;

    let credentials = if options.demo {
        Ok(None)
    } else {
        fetch_credentials(&config)
    };
    let project_id = match &credentials {
        Ok(Some(credentials)) => Some(credentials.project_id.as_str()),
        _ => None,
    };

    let db_path = if options.demo {
        Ok(PathBuf::from(":memory:"))
    } else {
        config.db_path(project_id)
    };
    if options.print_db_path {
        println!("{}", db_path?.display());
        return Ok(());
    }

    let store = connect_store(credentials, db_path, options.demo);
    if options.check_only {
        store?;
        return Ok(());
    }

    let mut state = AppState::new(&ui_settings);
    match store {
        Ok(store) => {
            let mut runtime = StoreRuntime::new(&store);
            stockpile_tui::run_app(&mut state, &mut runtime)
        }
        Err(error) => {
            warn!(error = %format!("{error:#}"), "store unavailable; starting offline");
            let mut runtime = OfflineRuntime::new(format!("{error:#}"));
            stockpile_tui::run_app(&mut state, &mut runtime)
        }
    }
}

/// Any failure on the way to an open store is returned rather than raised so
/// the caller can fall back to offline mode.
fn connect_store(
    credentials: Result<Option<StoreCredentials>>,
    db_path: Result<PathBuf>,
    demo: bool,
) -> Result<Store> {
    credentials?;
    let db_path = db_path.context("resolve database path")?;
    let store = open_store(&db_path, demo)?;
    info!(db = %db_path.display(), demo, "starting");
    Ok(store)
}

/// Asks the configured backend for store settings. No URL means a purely
/// local store.
fn fetch_credentials(config: &Config) -> Result<Option<StoreCredentials>> {
    let Some(url) = config.remote_config_url() else {
        return Ok(None);
    };
    let client = stockpile_remote::Client::new(url, config.remote_timeout()?)
        .context("invalid [remote] config; fix config_url/timeout values")?;
    let credentials = client.fetch_store_config()?;
    Ok(Some(credentials))
}

fn open_store(db_path: &Path, demo: bool) -> Result<Store> {
    let store = Store::open(db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [store].db_path or STOCKPILE_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;
    if demo {
        seed_demo_products(&store)?;
    }
    Ok(store)
}

fn seed_demo_products(store: &Store) -> Result<()> {
    let mut faker = ProductFaker::new(DEMO_SEED);
    for draft in faker.drafts(DEMO_PRODUCTS) {
        store
            .create_product(&draft)
            .with_context(|| format!("seed demo product {:?}", draft.name))?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => options.print_config_path = true,
            "--print-path" => options.print_db_path = true,
            "--print-example-config" => options.print_example = true,
            "--demo" => options.demo = true,
            "--check" => options.check_only = true,
            "--help" | "-h" => options.show_help = true,
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("stockpile");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --demo                   Launch with seeded demo products (in-memory)");
    println!("  --check                  Validate config, store settings, and database");
    println!("  --help                   Show this help");
}
