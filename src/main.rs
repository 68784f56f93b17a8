use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scholarag::assembler::parse_records;
use scholarag::cache::CollectionCache;
use scholarag::config::{BackendKind, Config};
use scholarag::conversation::{Conversation, Engine, Reply};
use scholarag::indexer::extract::DocumentExtractor;
use scholarag::llm::Generator;
use scholarag::llm::openai::OpenAiClient;
use scholarag::remote::RemoteIndex;
use scholarag::remote::solr::SolrClient;
use scholarag::retriever::{Backend, Retriever};

/// REPL input that reloads every collection from disk.
const RELOAD_COMMAND: &str = "/reload";

#[derive(Parser, Debug)]
#[command(name = "scholarag", version, about = "Question answering over theses and dissertations")]
struct Cli {
    /// Configuration file (JSON).
    #[arg(long, default_value = "config.json")]
    config: String,

    /// Evidence source; overrides the configured backend.
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,

    /// Session file to resume from and save to after every turn.
    #[arg(long)]
    session: Option<PathBuf>,

    /// Print the records behind each answer.
    #[arg(long)]
    sources: bool,

    /// Answer this question and exit; without it, questions are read from stdin
    /// (`/reload` rereads the collections).
    question: Option<String>,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    config.validate().context("invalid configuration")?;
    let kind = cli.backend.unwrap_or(config.backend);
    info!("Starting scholarag with {kind:?} backend");

    let generator: Arc<dyn Generator> = Arc::new(OpenAiClient::new(&config.llm)?);
    let remote: Arc<dyn RemoteIndex> = Arc::new(SolrClient::new(&config.remote)?);
    let cache = Arc::new(CollectionCache::from_config(
        &config,
        Arc::new(DocumentExtractor),
    ));
    let retriever = Arc::new(Retriever::new(&config, generator.clone(), remote, cache));
    let engine = Arc::new(Engine::new(
        &config,
        generator,
        retriever,
        Backend::from_config(&config, kind),
    ));

    let mut conversation = match &cli.session {
        Some(path) => Conversation::load(Arc::clone(&engine), path)?,
        None => Conversation::new(Arc::clone(&engine)),
    };

    if let Some(question) = &cli.question {
        return answer(&mut conversation, question, &cli);
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    write!(stdout, "> ")?;
    stdout.flush()?;
    for line in stdin.lock().lines() {
        let line = line.context("failed to read stdin")?;
        match line.trim() {
            "" => {}
            RELOAD_COMMAND => engine.reload(),
            question => answer(&mut conversation, question, &cli)?,
        }
        write!(stdout, "> ")?;
        stdout.flush()?;
    }
    Ok(())
}

fn answer(conversation: &mut Conversation, question: &str, cli: &Cli) -> Result<()> {
    let reply = conversation.ask(question)?;
    print_reply(&reply, cli.sources);

    if let Some(path) = &cli.session {
        conversation.save(path)?;
    }
    Ok(())
}

fn print_reply(reply: &Reply, sources: bool) {
    println!("{}\n", reply.text);
    if !sources {
        return;
    }
    let records = reply.context.as_deref().map(parse_records).unwrap_or_default();
    for r in records {
        println!("  [{}] {} ({}) {}", r.position, r.title, r.year, r.link);
    }
}
