//! QuizBuilder CLI: author multiple-choice quizzes with a language model.
//!
//! A teacher describes a question in plain French, the model drafts it,
//! a second strict call turns the draft into structured data, and the
//! reviewed quiz is published to the class.

mod author;
mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
