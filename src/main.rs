use chatguard::config::Config;
use chatguard::dlp::{build_corpus, load_items, EmbeddingClient};
use chatguard::moderation::ModerationPipeline;
use chatguard::BlockedUrlStore;
use clap::{Arg, Command};
use log::LevelFilter;
use std::process;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let matches = Command::new("chatguard")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Chat message moderation pipeline: malicious-URL screening and data-leak prevention")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("chatguard.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Validate the configuration and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .value_name("MESSAGE")
                .help("Screen a single message and print the outcome as JSON")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("check-url")
                .long("check-url")
                .value_name("URL")
                .help("Score a single URL and print the result as JSON")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("stats")
                .long("stats")
                .help("Show blocked-URL cache statistics")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("deactivate")
                .long("deactivate")
                .value_name("NORMALIZED_URL")
                .help("Soft-delete a blocked-URL record (history is kept)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("build-corpus")
                .long("build-corpus")
                .value_name("ITEMS_FILE")
                .help("Embed protected items from a JSON file and write the corpus")
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

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(path) = matches.get_one::<String>("generate-config") {
        match Config::generate_default(path) {
            Ok(()) => {
                println!("Wrote default configuration to {path}");
                return;
            }
            Err(e) => {
                eprintln!("Failed to generate configuration: {e:#}");
                process::exit(1);
            }
        }
    }

    let config_path = matches.get_one::<String>("config").unwrap();
    let config = if std::path::Path::new(config_path).exists() {
        match Config::load(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Configuration error: {e:#}");
                process::exit(1);
            }
        }
    } else {
        log::warn!("Config file {config_path} not found, using defaults");
        let config = Config::default();
        if let Err(e) = config.validate() {
            log::warn!("Running with configuration warnings: {e:#}");
        }
        config
    };

    if matches.get_flag("test-config") {
        match config.validate() {
            Ok(()) => {
                println!("Configuration OK");
                return;
            }
            Err(e) => {
                eprintln!("Configuration invalid: {e:#}");
                process::exit(1);
            }
        }
    }

    if matches.get_flag("stats") {
        let store = open_store_or_exit(&config);
        match store.stats() {
            Ok(stats) => {
                println!("{}", serde_json::to_string_pretty(&stats).unwrap());
            }
            Err(e) => {
                eprintln!("Failed to read cache statistics: {e:#}");
                process::exit(1);
            }
        }
        return;
    }

    if let Some(normalized) = matches.get_one::<String>("deactivate") {
        let store = open_store_or_exit(&config);
        match store.deactivate(normalized) {
            Ok(true) => println!("Deactivated {normalized}"),
            Ok(false) => println!("No record for {normalized}"),
            Err(e) => {
                eprintln!("Failed to deactivate record: {e:#}");
                process::exit(1);
            }
        }
        return;
    }

    if let Some(items_path) = matches.get_one::<String>("build-corpus") {
        let embedder = EmbeddingClient::new(
            config.apis.embedding.resolved_api_key(),
            config.apis.embedding.model.clone(),
            Duration::from_millis(config.apis.embedding.timeout_ms),
        );
        let result = async {
            let items = load_items(items_path)?;
            build_corpus(&items, &embedder, &config.security.dlp.corpus_path).await
        }
        .await;
        match result {
            Ok(count) => println!(
                "Wrote {count} embeddings to {}",
                config.security.dlp.corpus_path
            ),
            Err(e) => {
                eprintln!("Corpus build failed: {e:#}");
                process::exit(1);
            }
        }
        return;
    }

    if let Some(url) = matches.get_one::<String>("check-url") {
        let pipeline = pipeline_or_exit(&config);
        let result = pipeline.url_checker().check_url(url).await;
        pipeline.url_checker().flush().await;
        println!("{}", serde_json::to_string_pretty(&result).unwrap());
        return;
    }

    if let Some(message) = matches.get_one::<String>("check") {
        let pipeline = pipeline_or_exit(&config);
        let outcome = pipeline.screen_message(message).await;
        pipeline.url_checker().flush().await;
        println!("{}", serde_json::to_string_pretty(&outcome).unwrap());
        return;
    }

    eprintln!("Nothing to do; try --check, --check-url, --stats or --help");
    process::exit(2);
}

fn open_store_or_exit(config: &Config) -> BlockedUrlStore {
    match BlockedUrlStore::open(&config.security.blocked_url_cache.database_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Failed to open blocked-URL database: {e:#}");
            process::exit(1);
        }
    }
}

fn pipeline_or_exit(config: &Config) -> ModerationPipeline {
    match ModerationPipeline::new(config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize moderation pipeline: {e:#}");
            process::exit(1);
        }
    }
}
