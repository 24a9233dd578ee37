use anyhow::Result;
use clap::{value_parser, Arg, ArgAction, Command};
use colored::*;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use ai_screenshot_namer::{
    config::Config,
    naming::NamingOptions,
    ocr::Ocr,
    providers::{BackendKind, ModelClient},
    renamer::{Report, ScreenshotRenamer},
    utils::expand_inputs,
};

fn cli() -> Command {
    Command::new("aisn")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Rename screenshots with names suggested by a vision model")
        .arg(
            Arg::new("screenshots")
                .help("Screenshot files, or directories of screenshots")
                .value_name("SCREENSHOTS")
                .required(true)
                .num_args(1..)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("do-rename")
                .long("do-rename")
                .help("Rename the files; without this only the suggestions are shown")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("use-openai")
                .long("use-openai")
                .help("Use the OpenAI-compatible API instead of the local Ollama server")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-ocr")
                .long("no-ocr")
                .help("Do not extract text from the image")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-date")
                .long("no-date")
                .help("Do not prefix the date found in the original file name")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Show debug logging")
                .action(ArgAction::SetTrue),
        )
}

fn init_logging(verbose: bool) {
    let default = if verbose { "ai_screenshot_namer=debug,aisn=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("verbose"));

    let inputs: Vec<PathBuf> = matches
        .get_many::<PathBuf>("screenshots")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let do_rename = matches.get_flag("do-rename");

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) if e.is_fatal() => exit_with_config_error(e),
        Err(e) => return Err(e.into()),
    };
    if let Ok(path) = Config::get_config_file_path() {
        debug!(path = %path.display(), exists = path.exists(), "config file");
    }

    let client = match ModelClient::from_config(&config, matches.get_flag("use-openai")) {
        Ok(client) => client,
        Err(e) if e.is_fatal() => exit_with_config_error(e),
        Err(e) => return Err(e.into()),
    };

    match client.kind() {
        BackendKind::OpenAI => println!(
            "{} {} ({})",
            "🤖 Using OpenAI:".cyan().bold(),
            client.get_model_name().green(),
            client.endpoint()
        ),
        BackendKind::Ollama => println!(
            "{} {} ({})",
            "🤖 Using Ollama:".cyan().bold(),
            client.get_model_name().green(),
            client.endpoint()
        ),
    }
    if !do_rename {
        println!("{}", "Dry run: pass --do-rename to apply the new names.".yellow());
    }

    let files = expand_inputs(&inputs);
    if files.is_empty() {
        println!("{}", "No screenshots found.".yellow());
        return Ok(());
    }

    let options = NamingOptions {
        max_chars: config.max_chars,
        date_prefix: !matches.get_flag("no-date"),
    };
    let renamer = ScreenshotRenamer::new(
        client,
        Ocr::new(!matches.get_flag("no-ocr")),
        options,
        do_rename,
    );

    let report = renamer.run(&files).await;
    print_summary(&report);

    Ok(())
}

fn exit_with_config_error(e: ai_screenshot_namer::NamerError) -> ! {
    eprintln!("{}: {}", "Error".red().bold(), e);
    if e.to_string().contains("API key") {
        eprintln!("\n{}", "💡 Tip: set your API key:".yellow());
        eprintln!("  export AISN_OPENAI_API_KEY=your_key_here");
    }
    std::process::exit(2);
}

fn print_summary(report: &Report) {
    let mut parts = Vec::new();
    if report.renamed() > 0 {
        parts.push(format!("{} renamed", report.renamed()).green().to_string());
    }
    if report.suggested() > 0 {
        parts.push(format!("{} suggested", report.suggested()).cyan().to_string());
    }
    if report.unchanged() > 0 {
        parts.push(format!("{} unchanged", report.unchanged()));
    }
    if report.failed() > 0 {
        parts.push(format!("{} failed", report.failed()).red().to_string());
    }
    println!("\n{} {}", "Done:".bold(), parts.join(", "));
}
