//! Apisnare CLI

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use apisnare::browser::ChromiumEngine;
use apisnare::capture::{ApiDocument, CaptureRecord, RecordSink};
use apisnare::config::Config;
use apisnare::session::SessionController;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "capture" => {
            let config = match parse_capture_args(&args[2..]) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("{e}");
                    process::exit(1);
                }
            };

            init_tracing(config.debug);

            if let Err(e) = run_capture(config) {
                eprintln!("Capture failed: {e:#}");
                process::exit(1);
            }
        }
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            eprintln!("Run 'apisnare' for usage information.");
            process::exit(1);
        }
    }
}

fn usage() {
    eprintln!("Apisnare v{}", env!("CARGO_PKG_VERSION"));
    eprintln!();
    eprintln!("Usage: apisnare capture [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <file>        Load configuration from a TOML file");
    eprintln!("  --url <url>            URL to open the capture session on");
    eprintln!("  --browser-path <path>  Browser executable to launch");
    eprintln!("  --out <dir>            Write captured records into this directory");
    eprintln!("  --debug                Enable debug logging");
    eprintln!();
    eprintln!("Browse in the opened window; press Ctrl-C to stop and export.");
}

fn parse_capture_args(args: &[String]) -> apisnare::Result<Config> {
    let mut config = Config::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = expect_value(&mut iter, "--config")?;
                config = Config::from_file(&PathBuf::from(path))?;
            }
            "--url" => config.start_url = expect_value(&mut iter, "--url")?.clone(),
            "--browser-path" => {
                config.browser_path =
                    Some(PathBuf::from(expect_value(&mut iter, "--browser-path")?));
            }
            "--out" => {
                config.output_dir = Some(PathBuf::from(expect_value(&mut iter, "--out")?));
            }
            "--debug" => config.debug = true,
            other => {
                return Err(apisnare::SnareError::Config(format!(
                    "Unknown option: {other}"
                )));
            }
        }
    }

    config.validate()?;
    Ok(config)
}

fn expect_value<'a>(
    iter: &mut std::slice::Iter<'a, String>,
    flag: &str,
) -> apisnare::Result<&'a String> {
    iter.next()
        .ok_or_else(|| apisnare::SnareError::Config(format!("{flag} requires a value")))
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "apisnare=debug" } else { "apisnare=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Sink that announces each captured exchange as it happens
struct LogSink;

impl RecordSink for LogSink {
    fn emit(&self, record: &CaptureRecord) {
        info!(url = %record.url, method = %record.method, status = record.validator.status_code, "captured");
    }
}

fn run_capture(config: Config) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;

    runtime.block_on(async {
        let config = Arc::new(config);
        let controller = SessionController::new(
            Arc::clone(&config),
            Arc::new(ChromiumEngine::new()),
            Arc::new(LogSink),
        );

        controller
            .open_session()
            .await
            .context("failed to open capture session")?;

        info!("capturing; press Ctrl-C to stop");
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C, stopping now");
        }

        controller.request_stop();
        let records = controller
            .join_session()
            .await
            .context("capture session failed")?;

        export_records(&records, config.output_dir.as_deref())?;
        info!(records = records.len(), "capture complete");

        Ok(())
    })
}

fn export_records(records: &[CaptureRecord], output_dir: Option<&std::path::Path>) -> anyhow::Result<()> {
    for (index, record) in records.iter().enumerate() {
        let yaml = ApiDocument::new(record.clone())
            .to_yaml()
            .with_context(|| format!("failed to export record for {}", record.url))?;

        match output_dir {
            Some(dir) => {
                let path = dir.join(format!("api_{index:03}.yaml"));
                std::fs::write(&path, &yaml)
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
            None => {
                println!("---");
                print!("{yaml}");
            }
        }
    }

    Ok(())
}
