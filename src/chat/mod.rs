//! Interactive question-answering loop for the terminal.

use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use std::sync::Arc;

use crate::qa::{Answer, QaPipeline};

/// Run the chat loop until the user quits.
///
/// Each turn embeds the question, retrieves, and answers; errors are
/// rendered inline and the loop continues. An empty line, `exit`, or
/// `quit` ends the session.
#[inline]
pub async fn run(pipeline: Arc<QaPipeline>) -> Result<()> {
    eprintln!("{}", style("📘 Confluence Q&A Assistant").bold().cyan());
    eprintln!("Ask a question from the Confluence documents. Empty line to exit.");
    eprintln!();

    loop {
        let question: String = Input::new()
            .with_prompt("Question")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read question")?;

        let question = question.trim();
        if question.is_empty() || question == "exit" || question == "quit" {
            eprintln!("{}", style("Goodbye!").dim());
            return Ok(());
        }

        match pipeline.answer(question).await {
            Ok(answer) => render_answer(&answer),
            Err(error) => {
                eprintln!("{} {}", style("Error:").bold().red(), error);
            }
        }
        eprintln!();
    }
}

fn render_answer(answer: &Answer) {
    if answer.fallback {
        eprintln!("{}", style(&answer.text).yellow());
        return;
    }

    eprintln!("{}", answer.text);

    if !answer.sources.is_empty() {
        eprintln!();
        eprintln!("{}", style("Sources:").bold());
        for source in &answer.sources {
            eprintln!("  - {} ({})", source.title, style(&source.link).cyan());
        }
    }
}
