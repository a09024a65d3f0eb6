use clap::{Arg, Command};
use log::LevelFilter;
use mailtriage::history::{FileSenderHistory, InMemorySenderHistory, SenderHistory};
use mailtriage::{AnalysisEngine, AnalysisError, Config};
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let matches = Command::new("mailtriage")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Email risk triage: phishing and spam scoring for .eml messages")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("mailtriage.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Write a default configuration file and exit")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Validate the configuration and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("analyze")
                .short('a')
                .long("analyze")
                .value_name("FILE")
                .help("Analyze a single .eml file and print the verdict")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the full analysis report as JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("serve")
                .long("serve")
                .help("Run the HTTP analysis service")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("listen")
                .long("listen")
                .value_name("ADDR")
                .help("Override the listen address from the configuration")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    if let Some(path) = matches.get_one::<String>("generate-config") {
        match Config::default().to_file(path) {
            Ok(()) => {
                println!("Default configuration written to {path}");
                return;
            }
            Err(e) => {
                eprintln!("Failed to write configuration: {e}");
                process::exit(1);
            }
        }
    }

    let config_path = matches
        .get_one::<String>("config")
        .expect("config has a default");
    let mut config = if std::path::Path::new(config_path).exists() {
        match Config::from_file(config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Configuration error: {e}");
                process::exit(1);
            }
        }
    } else {
        log::debug!("no config file at {config_path}, using defaults");
        Config::default()
    };

    if matches.get_flag("test-config") {
        match config.validate() {
            Ok(()) => {
                println!("Configuration is valid");
                return;
            }
            Err(e) => {
                eprintln!("Configuration is invalid: {e}");
                process::exit(1);
            }
        }
    }

    if let Some(addr) = matches.get_one::<String>("listen") {
        config.listen = addr.clone();
    }

    if let Some(path) = matches.get_one::<String>("analyze") {
        let json = matches.get_flag("json");
        if let Err(e) = analyze_file(&config, path, json).await {
            eprintln!("Analysis failed: {e}");
            process::exit(1);
        }
        return;
    }

    if matches.get_flag("serve") {
        if let Err(e) = mailtriage::server::run(config).await {
            eprintln!("Server error: {e}");
            process::exit(1);
        }
        return;
    }

    eprintln!("Nothing to do: pass --serve, --analyze FILE, or --generate-config FILE");
    process::exit(1);
}

fn open_store(config: &Config) -> Arc<dyn SenderHistory> {
    if config.sender_db.is_empty() {
        return Arc::new(InMemorySenderHistory::new());
    }
    match FileSenderHistory::open(&config.sender_db) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::warn!("sender history file unavailable ({e}), using in-memory table");
            Arc::new(InMemorySenderHistory::new())
        }
    }
}

async fn analyze_file(config: &Config, path: &str, json: bool) -> anyhow::Result<()> {
    let raw = std::fs::read(path)?;
    if raw.len() > config.max_message_bytes {
        return Err(AnalysisError::InputTooLarge {
            limit: config.max_message_bytes,
        }
        .into());
    }

    let email = mailtriage::parse_message(&raw)?;
    let engine = AnalysisEngine::new(config, open_store(config))?;
    let report = engine.analyze(&email).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Classification: {:?}", report.classification);
        println!(
            "Phishing: {} ({:?})",
            report.phishing.score, report.phishing.level
        );
        println!(
            "Spam: {} ({:?}, probability {:.2})",
            report.spam.score, report.spam.level, report.spam.probability
        );
        println!(
            "Recommendation: {:?} - {}",
            report.recommendation.action, report.recommendation.reason
        );
        println!("Sender: {}", report.metadata.sender);
        println!("Subject: {}", report.metadata.subject);
        println!(
            "Attachments: {}, URLs: {}",
            report.metadata.attachment_count, report.metadata.url_count
        );
        if !report.phishing.findings.is_empty() {
            println!("Findings:");
            for finding in &report.phishing.findings {
                println!("  - {finding}");
            }
        }
    }
    Ok(())
}
