use clap::error::ErrorKind as ClapErrorKind;
use clap::Parser;
use std::process;
use tracing_subscriber::EnvFilter;
use xlsxcrack::cli::usage_error;
use xlsxcrack::{Cli, CrackError, Cracker, OutputFormatter, OutputMode, UserFriendlyError};

fn main() {
    let exit_code = run();
    process::exit(exit_code);
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => e.exit(),
            _ => {
                let formatter = OutputFormatter::new(OutputMode::Human, 0, false);
                return report_error(&formatter, usage_error(&e));
            }
        },
    };

    setup_logging(cli.verbosity_level());

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let cracker = match Cracker::from_cli(&cli) {
        Ok(cracker) => cracker,
        Err(e) => {
            let formatter = OutputFormatter::new(cli.output_mode(), cli.verbose, cli.quiet);
            return report_error(&formatter, e);
        }
    };

    let source = match cli.source() {
        Ok(source) => source,
        Err(e) => return report_error(cracker.output_formatter(), e),
    };

    if cli.dry_run {
        return handle_dry_run(&cli, &cracker);
    }

    match cracker.crack(source, cli.output.as_deref()) {
        Ok(report) => {
            let formatter = cracker.output_formatter();
            formatter.notice(&report);
            formatter.print_report(&report);
            0
        }
        Err(e) => report_error(cracker.output_formatter(), e),
    }
}

/// Prints the failure and returns the exit code for its kind.
fn report_error(formatter: &OutputFormatter, error: CrackError) -> i32 {
    let exit_code = error.kind().exit_code();

    match error {
        CrackError::Unexpected(ref cause) => formatter.unexpected(cause),
        ref handled => formatter.failure(handled),
    }

    exit_code
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "xlsxcrack.toml".to_string());

    match Cracker::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path);
            println!("\nTo use this configuration:");
            println!("  xlsxcrack <FILE_NAME> --config {}", config_path);
            0
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            1
        }
    }
}

fn handle_dry_run(cli: &Cli, cracker: &Cracker) -> i32 {
    let formatter = cracker.output_formatter();

    let source = match cli.source() {
        Ok(source) => source,
        Err(e) => return report_error(formatter, e),
    };

    match cracker.inspect(source, cli.output.as_deref()) {
        Ok((plan, inspection)) => {
            formatter.print_inspection(plan.source.path(), &plan.output, &inspection);
            0
        }
        Err(e) => report_error(formatter, e),
    }
}

fn setup_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "xlsxcrack=warn",
        1 => "xlsxcrack=info",
        2 => "xlsxcrack=debug",
        _ => "xlsxcrack=trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
