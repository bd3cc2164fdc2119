use std::io::Write;

use anyhow::Result;
use jobqa_core::{AskOutcome, Corpus};

use crate::cli::OutputFormat;

pub const TITLE: &str = "Agentic RAG — Germany Job Market (Demo)";
pub const DESCRIPTION: &str = "Retrieval-augmented question answering over a small job-market \
                               corpus, using local MiniLM embeddings and a DistilBERT reader.";
pub const FOOTER: &str =
    "Built with candle, tokenizers and a flat L2 index — free and open-source.";

const ANSWER_WIDTH: usize = 800;
const DOC_WIDTH: usize = 400;
const PLACEHOLDER: &str = " [...]";

/// Collapses whitespace and, if the result is wider than `width` characters,
/// drops trailing words and appends `[...]`.
pub fn shorten(text: &str, width: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let collapsed = words.join(" ");
    if collapsed.chars().count() <= width {
        return collapsed;
    }

    let budget = width.saturating_sub(PLACEHOLDER.chars().count());
    let mut kept = String::new();
    for word in words {
        let extra = usize::from(!kept.is_empty()) + word.chars().count();
        if kept.chars().count() + extra > budget {
            break;
        }
        if !kept.is_empty() {
            kept.push(' ');
        }
        kept.push_str(word);
    }

    if kept.is_empty() {
        PLACEHOLDER.trim_start().to_string()
    } else {
        kept + PLACEHOLDER
    }
}

pub fn write_outcome(
    out: &mut impl Write,
    outcome: &AskOutcome,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Text => write_text(out, outcome),
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(outcome)?)?;
            Ok(())
        }
    }
}

fn write_text(out: &mut impl Write, outcome: &AskOutcome) -> Result<()> {
    match outcome {
        AskOutcome::Warning { message } => {
            writeln!(out, "Warning: {message}")?;
        }
        AskOutcome::Answered {
            result,
            reasoning,
            hits,
        } => {
            if let Some(strategy) = reasoning {
                writeln!(out, "Agent reasoning: {}", strategy.instruction())?;
            }
            writeln!(out, "Answer")?;
            writeln!(out, "{}", shorten(&result.answer, ANSWER_WIDTH))?;
            writeln!(out, "Confidence: {:.2}", result.score)?;

            if !hits.is_empty() {
                writeln!(out)?;
                writeln!(out, "Retrieved Documents:")?;
                for (i, hit) in hits.iter().enumerate() {
                    writeln!(out, "Doc {}: {}", i + 1, shorten(&hit.text, DOC_WIDTH))?;
                }
            }
        }
        AskOutcome::Failed { reasoning, message } => {
            if let Some(strategy) = reasoning {
                writeln!(out, "Agent reasoning: {}", strategy.instruction())?;
            }
            writeln!(out, "{message}")?;
        }
    }
    Ok(())
}

pub fn write_corpus(out: &mut impl Write, corpus: &Corpus) -> Result<()> {
    for (i, doc) in corpus.iter().enumerate() {
        writeln!(out, "Doc {}: {}", i + 1, shorten(doc, DOC_WIDTH))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobqa_core::{QueryResult, RetrievedDoc, Strategy};

    fn render(outcome: &AskOutcome, format: OutputFormat) -> String {
        let mut buf = Vec::new();
        write_outcome(&mut buf, outcome, format).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn shorten_keeps_short_text() {
        assert_eq!(shorten("  Berlin,\n Munich  ", 20), "Berlin, Munich");
    }

    #[test]
    fn shorten_drops_trailing_words() {
        assert_eq!(shorten("Hello  world, this is long", 18), "Hello world, [...]");
        assert_eq!(shorten("Supercalifragilistic", 10), "[...]");
        assert!(shorten(&"word ".repeat(200), 400).chars().count() <= 400);
    }

    #[test]
    fn renders_answer_with_documents() {
        let outcome = AskOutcome::Answered {
            result: QueryResult {
                answer: "Frankfurt".to_string(),
                score: 0.876,
                start: 0,
                end: 9,
            },
            reasoning: Some(Strategy::Location),
            hits: vec![RetrievedDoc {
                index: 2,
                text: "Frankfurt is Germany’s finance hub".to_string(),
                distance: 0.3,
            }],
        };

        let text = render(&outcome, OutputFormat::Text);
        assert_eq!(
            text,
            "Agent reasoning: Focus on location and city information.\n\
             Answer\n\
             Frankfurt\n\
             Confidence: 0.88\n\
             \n\
             Retrieved Documents:\n\
             Doc 1: Frankfurt is Germany’s finance hub\n"
        );
    }

    #[test]
    fn renders_warning_and_failure() {
        let warning = AskOutcome::Warning {
            message: "Please enter a question first.".to_string(),
        };
        assert_eq!(
            render(&warning, OutputFormat::Text),
            "Warning: Please enter a question first.\n"
        );

        let failed = AskOutcome::Failed {
            reasoning: None,
            message: "Error: context is empty".to_string(),
        };
        assert_eq!(render(&failed, OutputFormat::Text), "Error: context is empty\n");
    }

    #[test]
    fn renders_json_with_status_tag() {
        let warning = AskOutcome::Warning {
            message: "Please enter a question first.".to_string(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&render(&warning, OutputFormat::Json)).unwrap();
        assert_eq!(json["status"], "warning");
        assert_eq!(json["message"], "Please enter a question first.");
    }

    #[test]
    fn lists_corpus() {
        let mut buf = Vec::new();
        write_corpus(&mut buf, &Corpus::job_market()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 5);
        assert!(text.starts_with("Doc 1: Germany has strong demand"));
    }
}
