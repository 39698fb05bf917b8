// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result};
use config::Config;
use operadoras_api::Client;
use operadoras_app::ViewController;
use operadoras_testkit::DemoCatalog;
use operadoras_tui::{TerminalChart, run_app};
use runtime::{ApiRuntime, DemoRuntime};
use std::env;
use std::path::PathBuf;
use tracing::info;

const DEMO_SEED: u64 = 2024;
const DEMO_GENERATED_RECORDS: usize = 37;

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
            "load config {}; run `operadoras --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    let log_path = config.log_path()?;
    if options.print_log_path {
        println!("{}", log_path.display());
        return Ok(());
    }

    let client = if !options.uses_network() {
        None
    } else {
        let base_url = config.api_base_url();
        Some(
            Client::new(&base_url, config.api_timeout()?).with_context(|| {
                format!(
                    "invalid [api] config in {}; fix base_url/timeout values",
                    options.config_path.display()
                )
            })?,
        )
    };

    if options.check_only {
        if let Some(client) = &client {
            client.ping().with_context(|| {
                format!(
                    "check API at {} -- if this URL is wrong, set [api].base_url or OPERADORAS_API_URL",
                    client.base_url()
                )
            })?;
        }
        return Ok(());
    }

    logging::init(&log_path, config.log_level())
        .with_context(|| format!("initialize logging at {}", log_path.display()))?;
    info!(
        config = %options.config_path.display(),
        demo = options.demo,
        "starting operadoras"
    );

    let mut controller = ViewController::new(TerminalChart::new());
    match client {
        Some(client) => {
            info!(base_url = client.base_url(), timeout = ?client.timeout(), "using HTTP API");
            run_app(&mut controller, &mut ApiRuntime::new(client))
        }
        None => {
            let catalog = DemoCatalog::seeded(DEMO_SEED, DEMO_GENERATED_RECORDS);
            info!(records = catalog.len(), "using demo catalog");
            run_app(&mut controller, &mut DemoRuntime::new(catalog))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_log_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

impl CliOptions {
    /// `--demo` serves the seeded catalog, so no client is built and `--check`
    /// only validates the config.
    fn uses_network(&self) -> bool {
        !self.demo
    }
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_log_path: false,
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
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-log-path" => {
                options.print_log_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
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
    println!("operadoras: browse ANS health-plan operators and their expenses");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-log-path         Print resolved log file path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --demo                   Browse a seeded in-memory catalog (no network)");
    println!("  --check                  Validate config and ping the API (skipped with --demo)");
    println!("  --help                   Show this help");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, parse_cli_args};
    use anyhow::Result;
    use std::path::PathBuf;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/operadoras-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                print_config_path: false,
                print_log_path: false,
                demo: false,
                print_example: false,
                check_only: false,
                show_help: false,
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_config_path_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["--config", "/custom/config.toml"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/custom/config.toml"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_missing_config_value() {
        let error = parse_cli_args(vec!["--config"], default_options_path())
            .expect_err("missing config value should fail");
        assert!(error.to_string().contains("--config requires a file path"));
    }

    #[test]
    fn parse_cli_args_errors_for_unknown_argument() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown arg should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));
    }

    #[test]
    fn check_pings_the_api_unless_demo() -> Result<()> {
        let live = parse_cli_args(vec!["--check"], default_options_path())?;
        assert!(live.check_only);
        assert!(live.uses_network());

        let offline = parse_cli_args(vec!["--demo", "--check"], default_options_path())?;
        assert!(offline.check_only);
        assert!(offline.demo);
        assert!(!offline.uses_network());
        Ok(())
    }

    #[test]
    fn demo_flag_order_does_not_matter() -> Result<()> {
        let before = parse_cli_args(vec!["--demo", "--check"], default_options_path())?;
        let after = parse_cli_args(vec!["--check", "--demo"], default_options_path())?;
        assert_eq!(before, after);
        Ok(())
    }

    #[test]
    fn print_log_path_combines_with_config_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["--print-log-path", "--config", "/etc/operadoras.toml"],
            default_options_path(),
        )?;
        assert!(options.print_log_path);
        assert!(!options.print_config_path);
        assert_eq!(options.config_path, PathBuf::from("/etc/operadoras.toml"));
        Ok(())
    }

    #[test]
    fn config_takes_next_argument_verbatim() -> Result<()> {
        let options = parse_cli_args(vec!["--config", "--demo"], default_options_path())?;
        assert_eq!(options.config_path, PathBuf::from("--demo"));
        assert!(!options.demo);
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_help_flag_for_long_and_short_variants() -> Result<()> {
        let long = parse_cli_args(vec!["--help"], default_options_path())?;
        assert!(long.show_help);

        let short = parse_cli_args(vec!["-h"], default_options_path())?;
        assert!(short.show_help);
        Ok(())
    }
}
