use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use jobqa_core::Mode;

#[derive(Parser, Debug)]
#[command(
    name = "jobqa",
    version,
    about = "Ask questions about the German job market"
)]
pub struct Cli {
    /// TOML config file. Defaults to <config dir>/jobqa/config.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// MiniLM weights (.safetensors). Requires --embed-tokenizer.
    #[arg(long, global = true)]
    pub embed_model: Option<PathBuf>,

    #[arg(long, global = true)]
    pub embed_tokenizer: Option<PathBuf>,

    /// DistilBERT SQuAD weights (.safetensors). Requires --qa-tokenizer.
    #[arg(long, global = true)]
    pub qa_model: Option<PathBuf>,

    #[arg(long, global = true)]
    pub qa_tokenizer: Option<PathBuf>,

    #[arg(long, global = true, value_enum)]
    pub mode: Option<ModeArg>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer one question and exit
    Ask(AskArgs),
    /// Answer questions read from an interactive prompt
    Repl(SessionArgs),
    /// List the documents the selected mode reads from
    Docs,
}

#[derive(Args, Debug, Default)]
pub struct SessionArgs {
    /// Documents to retrieve
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub top_k: Option<u8>,

    /// Show the agent reasoning line, overriding the config file
    #[arg(long, overrides_with = "no_reasoning")]
    pub reasoning: bool,

    /// Hide the agent reasoning line
    #[arg(long, overrides_with = "reasoning")]
    pub no_reasoning: bool,
}

impl SessionArgs {
    /// The last of `--reasoning`/`--no-reasoning` wins; neither keeps `default`.
    pub fn show_reasoning(&self, default: bool) -> bool {
        if self.reasoning {
            true
        } else if self.no_reasoning {
            false
        } else {
            default
        }
    }
}

#[derive(Args, Debug)]
pub struct AskArgs {
    pub question: String,

    #[command(flatten)]
    pub session: SessionArgs,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Retrieval,
    Fixed,
}

impl From<ModeArg> for Mode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Retrieval => Mode::Retrieval,
            ModeArg::Fixed => Mode::Fixed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
