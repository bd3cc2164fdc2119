mod cli;
mod output;

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use jobqa_core::{
    AppConfig, AskOutcome, AskRequest, Assistant, Corpus, DistilBertQa, EmbeddingProvider,
    HashEmbeddingProvider, LexicalAnswerer, MiniLmEmbeddingProvider, Mode, ModelFiles,
    QuestionAnswerer, TopK,
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, OutputFormat, SessionArgs};
use crate::output::{write_corpus, write_outcome, DESCRIPTION, FOOTER, TITLE};

type DynAssistant = Assistant<Box<dyn EmbeddingProvider>, Box<dyn QuestionAnswerer>>;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

/// Config file values with command-line overrides applied.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("load config")?;
    config.embedder.merge(ModelFiles::new(
        cli.embed_model.clone(),
        cli.embed_tokenizer.clone(),
    ));
    config
        .qa
        .merge(ModelFiles::new(cli.qa_model.clone(), cli.qa_tokenizer.clone()));
    if let Some(mode) = cli.mode {
        config.mode = mode.into();
    }
    Ok(config)
}

fn session_request(
    config: &AppConfig,
    args: &SessionArgs,
    question: String,
) -> Result<AskRequest> {
    let top_k = match args.top_k {
        Some(k) => TopK::new(k as usize)?,
        None => config.top_k,
    };
    Ok(AskRequest {
        question,
        top_k,
        show_reasoning: args.show_reasoning(config.show_reasoning),
    })
}

fn make_embedder(files: &ModelFiles) -> Result<Box<dyn EmbeddingProvider>> {
    match files.paths()? {
        Some((model, tokenizer)) => {
            eprintln!("Loading embedding model from {} ...", model.display());
            Ok(Box::new(MiniLmEmbeddingProvider::load(model, tokenizer)?))
        }
        None => {
            tracing::warn!("no embedding model configured, using hashed embeddings");
            Ok(Box::new(HashEmbeddingProvider::default()))
        }
    }
}

fn make_reader(files: &ModelFiles) -> Result<Box<dyn QuestionAnswerer>> {
    match files.paths()? {
        Some((model, tokenizer)) => {
            eprintln!("Loading QA model from {} ...", model.display());
            Ok(Box::new(DistilBertQa::load(model, tokenizer)?))
        }
        None => {
            tracing::warn!("no QA model configured, using lexical reader");
            Ok(Box::new(LexicalAnswerer::new()))
        }
    }
}

fn build_assistant(config: &AppConfig) -> Result<DynAssistant> {
    let reader = make_reader(&config.qa)?;
    let assistant = match config.mode {
        Mode::Retrieval => {
            let embedder = make_embedder(&config.embedder)?;
            Assistant::with_retrieval(embedder, Corpus::job_market(), reader)
                .context("build retrieval index")?
        }
        Mode::Fixed => Assistant::with_fixed_context(Corpus::fixed_paragraph(), reader),
    };
    Ok(assistant)
}

fn run_repl(assistant: &DynAssistant, config: &AppConfig, args: &SessionArgs) -> Result<()> {
    let mut stdout = io::stdout();
    writeln!(stdout, "{TITLE}")?;
    writeln!(stdout, "{DESCRIPTION}")?;
    writeln!(stdout, "Type a question and press Enter; `exit` to quit.")?;

    let mut rl = DefaultEditor::new()?;
    loop {
        let line = match rl.readline("question> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let trimmed = line.trim();
        if matches!(trimmed.to_ascii_lowercase().as_str(), "exit" | "quit") {
            break;
        }
        if !trimmed.is_empty() {
            rl.add_history_entry(trimmed).ok();
        }

        let request = session_request(config, args, trimmed.to_string())?;
        let outcome = assistant.ask(&request)?;
        write_outcome(&mut stdout, &outcome, OutputFormat::Text)?;
        writeln!(stdout)?;
    }

    writeln!(stdout, "---")?;
    writeln!(stdout, "{FOOTER}")?;
    Ok(())
}

/// `ask` exits 1 when the reader failed, even though the error was rendered.
fn exit_status(outcome: &AskOutcome) -> u8 {
    match outcome {
        AskOutcome::Failed { .. } => 1,
        AskOutcome::Warning { .. } | AskOutcome::Answered { .. } => 0,
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    match &cli.command {
        Commands::Docs => {
            let corpus = match config.mode {
                Mode::Retrieval => Corpus::job_market(),
                Mode::Fixed => Corpus::fixed_paragraph(),
            };
            write_corpus(&mut io::stdout(), &corpus)?;
        }
        Commands::Ask(args) => {
            let request = session_request(&config, &args.session, args.question.clone())?;
            let assistant = build_assistant(&config)?;
            let outcome = assistant.ask(&request)?;
            write_outcome(&mut io::stdout(), &outcome, args.format)?;
            return Ok(ExitCode::from(exit_status(&outcome)));
        }
        Commands::Repl(args) => {
            let assistant = build_assistant(&config)?;
            run_repl(&assistant, &config, args)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    init_tracing();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
