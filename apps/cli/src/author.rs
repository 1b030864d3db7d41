//! Interactive authoring session on stdin.
//!
//! Plain lines are instructions for the model; lines starting with `:` are
//! session commands. The session walks create_master, generate_variations
//! and review, then publishes the quiz on `:submit`.

use std::io::Write;

use color_eyre::eyre::{Result, eyre};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::debug;

use quizbuilder_core::{
    AuthoringPipeline, MasterOutcome, NotificationStatus, NotifyOutcome, Notifier,
    PipelineSession, QuestionStore, Regenerated, VariationsOutcome,
};
use quizbuilder_llm::ChatBackend;
use quizbuilder_shared::{
    AppConfig, Label, Question, QuestionKind, QuizBuilderError, Stage, ValidationIssue,
};

use crate::commands::spinner;

pub(crate) struct AuthorOptions {
    pub teacher: String,
    pub class: String,
    pub level: Option<String>,
    pub kind: Option<QuestionKind>,
    pub count: Option<u32>,
}

/// One parsed input line.
#[derive(Debug, PartialEq)]
enum Input {
    Text(String),
    Help,
    Quit,
    Regen,
    List,
    Show(usize),
    Issues,
    Edit(usize, String),
    Test,
    Submit,
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    let Some(rest) = line.strip_prefix(':') else {
        return Input::Text(line.to_string());
    };

    let (command, arg) = match rest.split_once(char::is_whitespace) {
        Some((c, a)) => (c, a.trim()),
        None => (rest, ""),
    };

    match command {
        "help" | "h" => Input::Help,
        "quit" | "q" => Input::Quit,
        "regen" | "r" => Input::Regen,
        "list" | "ls" => Input::List,
        "issues" => Input::Issues,
        "test" => Input::Test,
        "submit" => Input::Submit,
        "show" => match parse_position(arg) {
            Some(i) => Input::Show(i),
            None => Input::Unknown(line.to_string()),
        },
        "edit" => {
            let (n, json) = arg.split_once(char::is_whitespace).unwrap_or((arg, ""));
            match parse_position(n) {
                Some(i) if !json.trim().is_empty() => Input::Edit(i, json.trim().to_string()),
                _ => Input::Unknown(line.to_string()),
            }
        }
        _ => Input::Unknown(line.to_string()),
    }
}

/// 1-based position on screen, 0-based index in the session.
fn parse_position(arg: &str) -> Option<usize> {
    arg.parse::<usize>().ok().filter(|n| *n > 0).map(|n| n - 1)
}

/// Run an authoring session until the quiz is submitted or the author quits.
pub(crate) async fn run_session<B, S, N>(
    backend: B,
    store: S,
    notifier: N,
    mut config: AppConfig,
    options: AuthorOptions,
) -> Result<()>
where
    B: ChatBackend,
    S: QuestionStore,
    N: Notifier,
{
    if let Some(level) = options.level {
        config.defaults.class_level = level;
    }
    if let Some(kind) = options.kind {
        config.defaults.question_kind = kind;
    }
    if let Some(count) = options.count {
        if count == 0 {
            return Err(eyre!("--count must be at least 1"));
        }
        config.defaults.variation_count = count;
    }

    let pipeline = AuthoringPipeline::new(backend, store, notifier, config);
    let mut session = pipeline.new_session(&options.teacher, &options.class);
    debug!(session = %session.id(), "session created");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!(
        "Class {} ({}), {} questions of kind '{}'. Type :help for commands.",
        session.context().class_id,
        session.context().class_level,
        session.context().variation_count,
        session.context().question_kind,
    );
    print_stage_hint(&session);

    loop {
        prompt(&session)?;
        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        match parse_input(&line) {
            Input::Quit => break,
            Input::Help => print_help(),
            Input::Unknown(raw) => println!("Unknown command '{raw}'. Type :help."),
            Input::Text(text) => on_text(&pipeline, &mut session, &text).await,
            Input::Regen => {
                let progress = spinner("Regenerating…");
                let result = pipeline.regenerate(&mut session).await;
                progress.finish_and_clear();
                match result {
                    Ok(Regenerated::Master(outcome)) => show_master(&outcome),
                    Ok(Regenerated::Variations(outcome)) => show_variations(&session, &outcome),
                    Err(e) => report(&e),
                }
            }
            Input::List => list_variations(&session),
            Input::Show(i) => match session.variations().get(i) {
                Some(q) => print_question(q),
                None => println!("No variation #{}.", i + 1),
            },
            Input::Issues => print_issues(&session),
            Input::Edit(i, json) => edit_variation(&mut session, i, &json),
            Input::Test => {
                if let Err(e) = run_test(&session, &mut lines).await {
                    report(&e);
                }
            }
            Input::Submit => {
                let progress = spinner("Publishing quiz…");
                let result = pipeline.submit(&mut session).await;
                progress.finish_and_clear();
                match result {
                    Ok(receipt) => {
                        println!(
                            "Published activity {} with {} questions.",
                            receipt.activity_id, receipt.variation_count
                        );
                        match receipt.notification {
                            NotificationStatus::Sent(NotifyOutcome::Delivered(n)) => {
                                println!("Notified {n} students.")
                            }
                            NotificationStatus::Sent(NotifyOutcome::NoStudents) => {
                                println!("No students enrolled in this class yet.")
                            }
                            NotificationStatus::Failed(msg) => {
                                println!("Students were not notified: {msg}")
                            }
                        }
                        break;
                    }
                    Err(e) => report(&e),
                }
            }
        }
    }
    Ok(())
}

async fn on_text<B, S, N>(
    pipeline: &AuthoringPipeline<B, S, N>,
    session: &mut PipelineSession,
    text: &str,
) where
    B: ChatBackend,
    S: QuestionStore,
    N: Notifier,
{
    match session.stage() {
        Stage::CreateMaster => {
            if text.is_empty() {
                println!("Describe the question you want, e.g. \"additions à deux chiffres\".");
                return;
            }
            let progress = spinner("Generating master question…");
            let result = pipeline.create_master(session, text).await;
            progress.finish_and_clear();
            match result {
                Ok(outcome) => {
                    show_master(&outcome);
                    print_stage_hint(session);
                }
                Err(e) => report(&e),
            }
        }
        Stage::GenerateVariations => {
            let extra = (!text.is_empty()).then_some(text);
            let progress = spinner("Generating variations…");
            let result = pipeline.generate_variations(session, extra).await;
            progress.finish_and_clear();
            match result {
                Ok(outcome) => {
                    show_variations(session, &outcome);
                    print_stage_hint(session);
                }
                Err(e) => report(&e),
            }
        }
        Stage::Review => {
            if !text.is_empty() {
                println!("The set is ready for review. Use :list, :edit, :test or :submit.");
            }
        }
    }
}

/// Decode an edited question. Issues cover both the decoding and the
/// validation of the result.
fn decode_edit(json: &str) -> serde_json::Result<(Question, Vec<ValidationIssue>)> {
    let value = serde_json::from_str(json)?;
    Ok(Question::from_value(&value))
}

fn edit_variation(session: &mut PipelineSession, index: usize, json: &str) {
    let (question, issues) = match decode_edit(json) {
        Ok(decoded) => decoded,
        Err(e) => {
            println!("Not valid JSON: {e}");
            return;
        }
    };
    match session.edit_variation(index, question) {
        Ok(_) if issues.is_empty() => println!("Variation #{} updated.", index + 1),
        Ok(_) => {
            println!("Variation #{} updated but still needs fixing:", index + 1);
            for issue in issues {
                println!("  - {issue}");
            }
        }
        Err(e) => report(&e),
    }
}

async fn run_test(
    session: &PipelineSession,
    lines: &mut Lines<BufReader<Stdin>>,
) -> std::result::Result<(), QuizBuilderError> {
    let mut run = session.test_run()?;
    println!("Test mode: answer with A, B, C or D. Empty line stops.");

    while let Some(question) = run.current() {
        println!();
        println!("Question {}/{}", run.current_question + 1, run.total());
        print_options(question);

        let label = loop {
            print!("answer> ");
            flush();
            let line = lines
                .next_line()
                .await
                .map_err(|e| QuizBuilderError::io("<stdin>", e))?;
            let Some(line) = line else {
                return Ok(());
            };
            if line.trim().is_empty() {
                println!("Test stopped at {}/{}.", run.score, run.total());
                return Ok(());
            }
            match line.parse::<Label>() {
                Ok(label) => break label,
                Err(_) => println!("Type A, B, C or D."),
            }
        };

        let outcome = run.answer(label)?;
        if outcome.correct {
            println!("Correct!");
        } else {
            let right = outcome
                .correct_answer
                .map(|l| l.to_string())
                .unwrap_or_else(|| "?".into());
            println!("Wrong, the answer was {right}.");
        }
        if let Some(explanation) = outcome.explanation {
            println!("  {explanation}");
        }
    }

    println!();
    println!("Score: {}/{}", run.score, run.total());
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn prompt(session: &PipelineSession) -> Result<()> {
    print!("[{}]> ", session.stage());
    std::io::stdout().flush()?;
    Ok(())
}

fn flush() {
    let _ = std::io::stdout().flush();
}

fn report(err: &QuizBuilderError) {
    println!("Error: {err}");
    if err.is_retryable() {
        println!("  Try again, or :regen to resend the last request.");
    }
}

fn print_stage_hint(session: &PipelineSession) {
    match session.stage() {
        Stage::CreateMaster => println!("Describe the master question to generate."),
        Stage::GenerateVariations => println!(
            "Press Enter to generate {} variations, or type extra instructions.",
            session.context().variation_count
        ),
        Stage::Review => {
            println!("Review the set with :list, :show N, :edit N <json>, :test, then :submit.")
        }
    }
}

fn print_help() {
    println!(
        "\
Commands:
  <text>          instructions for the current stage
  :regen          resend the last request of this stage
  :list           list generated variations
  :show N         print variation N
  :issues         list variations that fail validation
  :edit N <json>  replace variation N with a question object
  :test           take the quiz yourself
  :submit         publish the quiz and notify the class
  :quit           leave without publishing"
    );
}

fn show_master(outcome: &MasterOutcome) {
    println!("Master question:");
    print_question(&outcome.question);
    if let Some(err) = &outcome.persist_error {
        println!("(not saved yet: {err}; it will be saved on submit)");
    }
}

fn show_variations(session: &PipelineSession, outcome: &VariationsOutcome) {
    println!("{} variations generated.", outcome.count);
    list_variations(session);
    if !outcome.issues.is_empty() {
        println!("{} need fixing before submit, see :issues.", outcome.issues.len());
    }
}

fn list_variations(session: &PipelineSession) {
    if session.variations().is_empty() {
        println!("No variations yet.");
        return;
    }
    for (i, q) in session.variations().iter().enumerate() {
        let marker = if q.is_valid() { " " } else { "!" };
        println!("{marker}{:>3}. {}", i + 1, q.prompt);
    }
}

fn print_issues(session: &PipelineSession) {
    let issues = session.variation_issues();
    if issues.is_empty() {
        println!("All variations are valid.");
        return;
    }
    for (i, list) in issues {
        println!("#{}:", i + 1);
        for issue in list {
            println!("  - {issue}");
        }
    }
}

fn print_options(question: &Question) {
    println!("{}", question.prompt);
    for label in Label::ALL {
        let text = question.options.get(&label).map(String::as_str).unwrap_or("");
        println!("  {label}) {text}");
    }
}

/// Print a question with its answer and explanation.
pub(crate) fn print_question(question: &Question) {
    if let Some(kind) = question.kind {
        println!("[{kind}]");
    }
    print_options(question);
    match (question.correct_answer, question.correct_option()) {
        (Some(label), Some(text)) => println!("Answer: {label}) {text}"),
        (Some(label), None) => println!("Answer: {label} (no such option)"),
        (None, _) => println!("Answer: missing"),
    }
    if let Some(explanation) = &question.explanation {
        println!("Why: {explanation}");
    }
}
