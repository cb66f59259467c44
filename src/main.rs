//! 命令行入口：对本地 HTML 文件执行一次完整的翻译遍历

use std::io::Write;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use page_translator::dom::{html_to_dom, serialize_document};
use page_translator::env::{self, EnvVar};
use page_translator::translation::{
    domain_from_url, AugmentorRegistry, ConfigManager, ContextClassifier, ContextMappingDocument,
    DocumentFormat, FileRuleSource, KeywordTable, RuleDocument, RuleSource, TranslationEngine,
    TranslationIndex, TranslationResult, TranslatorConfig,
};
#[cfg(feature = "http")]
use page_translator::translation::HttpRuleSource;
#[cfg(not(feature = "http"))]
use page_translator::translation::TranslationError;

#[derive(Parser)]
#[command(name = "page-translator")]
#[command(about = "Rule-driven in-place page translation")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate an HTML document
    Translate {
        /// Input HTML file
        input: PathBuf,

        /// Rule document (JSON or TOML), a file path or an http(s) URL
        #[arg(short, long)]
        rules: String,

        /// Context mapping document; the built-in GitHub mapping is used when absent
        #[arg(short, long)]
        mapping: Option<String>,

        /// Page URL, selects site-specific augmentors
        #[arg(short, long)]
        url: Option<String>,

        /// Output file, stdout when absent
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Input document charset
        #[arg(long, default_value = "utf-8")]
        charset: String,

        /// Skip the built-in keyword pass
        #[arg(long)]
        no_keywords: bool,
    },

    /// Write an example configuration file
    InitConfig {
        /// Destination path
        path: PathBuf,
    },

    /// Print supported environment variables
    EnvDocs,
}

fn init_tracing() {
    let env_filter = env::core::LogLevel::get_optional()
        .ok()
        .flatten()
        .and_then(|level| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&PathBuf>) -> TranslationResult<TranslatorConfig> {
    let manager = match path {
        Some(path) => ConfigManager::from_file(path)?,
        None => ConfigManager::new()?,
    };
    Ok(manager.into_config())
}

struct TranslateArgs {
    input: PathBuf,
    rules: String,
    mapping: Option<String>,
    url: Option<String>,
    output: Option<PathBuf>,
    charset: String,
    no_keywords: bool,
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

async fn fetch(location: &str) -> TranslationResult<Vec<u8>> {
    if is_remote(location) {
        #[cfg(feature = "http")]
        return HttpRuleSource::new()?.fetch(location).await;
        #[cfg(not(feature = "http"))]
        return Err(TranslationError::Config(format!(
            "未启用 http 功能，无法获取 {}",
            location
        )));
    }
    FileRuleSource::new().fetch(location).await
}

async fn translate(config: &TranslatorConfig, args: TranslateArgs) -> TranslationResult<usize> {
    let rules = RuleDocument::decode(
        &fetch(&args.rules).await?,
        DocumentFormat::from_location(&args.rules),
    )?;
    if !rules.report.is_clean() {
        eprintln!(
            "Warning: {} of {} rules were dropped",
            rules.report.dropped.len(),
            rules.report.total
        );
    }

    let mapping = match &args.mapping {
        Some(location) => ContextMappingDocument::decode(
            &fetch(location).await?,
            DocumentFormat::from_location(location),
        )?,
        None => ContextMappingDocument::github_default(),
    };

    let mut engine = TranslationEngine::new(
        TranslationIndex::build(&rules.translations),
        ContextClassifier::new(&mapping).with_max_ancestor_depth(config.max_ancestor_depth),
    );
    if args.no_keywords {
        engine = engine.with_keywords(KeywordTable::empty());
    }

    let html = tokio::fs::read(&args.input).await?;
    let dom = html_to_dom(&html, &args.charset);
    let host = args.url.as_deref().and_then(domain_from_url);
    let report = engine.run_pass(&dom.document, &AugmentorRegistry::new(), host.as_deref());
    let total = report.total();

    let result = serialize_document(dom, &args.charset)?;
    match &args.output {
        Some(path) => tokio::fs::write(path, result).await?,
        None => std::io::stdout().write_all(&result)?,
    }

    Ok(total)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::InitConfig { path } => {
            if let Err(e) = ConfigManager::generate_example_config(&path) {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
            eprintln!("Wrote {}", path.display());
        }
        Commands::EnvDocs => {
            println!("{}", env::generate_env_docs());
        }
        Commands::Translate {
            input,
            rules,
            mapping,
            url,
            output,
            charset,
            no_keywords,
        } => {
            let config = match load_config(cli.config.as_ref()) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    process::exit(1);
                }
            };

            let args = TranslateArgs {
                input,
                rules,
                mapping,
                url,
                output,
                charset,
                no_keywords,
            };
            match translate(&config, args).await {
                Ok(total) => eprintln!("{} substitutions", total),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    process::exit(1);
                }
            }
        }
    }
}
