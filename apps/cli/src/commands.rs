//! CLI command definitions, routing, and tracing setup.

use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use quizbuilder_core::{FormatRequest, FormatResponse, StructuredFormatter};
use quizbuilder_llm::ChatClient;
use quizbuilder_shared::{
    AppConfig, Question, QuestionKind, Shape, config_file_path, init_config, load_config, validate_api_key,
};
use quizbuilder_storage::{ActivityRow, Storage};

use crate::author::{self, AuthorOptions};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// QuizBuilder: turn a teacher's instructions into a reviewed, published quiz.
#[derive(Parser)]
#[command(
    name = "quizbuilder",
    version,
    about = "Author multiple-choice quizzes for primary-school classes with a language model.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Database file (overrides `defaults.db_path`).
    #[arg(long, global = true, env = "QUIZBUILDER_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Expected payload shape on the command line.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum ShapeArg {
    Single,
    Array,
}

impl From<ShapeArg> for Shape {
    fn from(arg: ShapeArg) -> Self {
        match arg {
            ShapeArg::Single => Shape::Single,
            ShapeArg::Array => Shape::Array,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Start an interactive authoring session.
    Author {
        /// Teacher identifier recorded on the published activity.
        #[arg(long)]
        teacher: String,

        /// Class whose students receive the quiz.
        #[arg(long)]
        class: String,

        /// Class level (CP, CE1, CE2, CM1, CM2). Defaults to `defaults.class_level`.
        #[arg(long)]
        level: Option<String>,

        /// Master question kind: short, long or image.
        #[arg(long)]
        kind: Option<QuestionKind>,

        /// Number of variations to request.
        #[arg(long)]
        count: Option<u32>,
    },

    /// Convert raw model text into question JSON.
    ///
    /// Reads a `{"rawResponse", "isArray"}` request from stdin, or plain text
    /// with `--text`, and prints the formatting response.
    Format {
        /// Treat stdin as plain text rather than a JSON request.
        #[arg(long)]
        text: bool,

        /// Expected shape when reading plain text.
        #[arg(long, value_enum, default_value = "single")]
        shape: ShapeArg,
    },

    /// Published activities.
    Activities {
        #[command(subcommand)]
        action: ActivitiesAction,
    },

    /// Class membership.
    Class {
        #[command(subcommand)]
        action: ClassAction,
    },

    /// List a student's notifications.
    Notifications {
        /// Student identifier.
        #[arg(long)]
        student: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum ActivitiesAction {
    /// List activities created by a teacher.
    List {
        #[arg(long)]
        teacher: String,
    },
    /// Show one activity with its variations.
    Show {
        /// Activity ID.
        id: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum ClassAction {
    /// Enroll a student in a class.
    Enroll {
        #[arg(long)]
        class: String,
        #[arg(long)]
        student: String,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so they do not
/// mix with command output.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "quizbuilder=info",
        1 => "quizbuilder=debug",
        _ => "quizbuilder=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let db = cli.db;
    match cli.command {
        Command::Author {
            teacher,
            class,
            level,
            kind,
            count,
        } => {
            let options = AuthorOptions {
                teacher,
                class,
                level,
                kind,
                count,
            };
            cmd_author(db, options).await
        }
        Command::Format { text, shape } => cmd_format(text, shape.into()).await,
        Command::Activities { action } => match action {
            ActivitiesAction::List { teacher } => cmd_activities_list(db, &teacher).await,
            ActivitiesAction::Show { id } => cmd_activities_show(db, &id).await,
        },
        Command::Class { action } => match action {
            ClassAction::Enroll { class, student } => cmd_class_enroll(db, &class, &student).await,
        },
        Command::Notifications { student } => cmd_notifications(db, &student).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

fn resolve_db(config: &AppConfig, flag: Option<PathBuf>) -> Result<PathBuf> {
    match flag {
        Some(path) => Ok(path),
        None => Ok(config.db_path()?),
    }
}

/// Spinner shown while a model or storage call is in flight.
pub(crate) fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    spinner.set_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_author(db: Option<PathBuf>, options: AuthorOptions) -> Result<()> {
    let config = load_config()?;
    validate_api_key(&config)?;

    let db_path = resolve_db(&config, db)?;
    let client = ChatClient::from_config(&config)?;
    let storage = Storage::open(&db_path).await?;

    info!(
        teacher = %options.teacher,
        class = %options.class,
        db = %db_path.display(),
        "starting authoring session"
    );
    author::run_session(client, &storage, &storage, config, options).await
}

async fn cmd_format(text: bool, shape: Shape) -> Result<()> {
    let config = load_config()?;
    validate_api_key(&config)?;

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .map_err(|e| eyre!("failed to read stdin: {e}"))?;

    let request = if text {
        FormatRequest {
            raw_response: input,
            is_array: shape.is_array(),
        }
    } else {
        serde_json::from_str::<FormatRequest>(&input)
            .map_err(|e| eyre!("stdin is not a formatting request ({e}); use --text for plain text"))?
    };

    let client = ChatClient::from_config(&config)?;
    let formatter =
        StructuredFormatter::new(&client, &config.llm.model, &config.formatting.call);

    let progress = spinner("Formatting…");
    let response = formatter
        .handle(&request, config.formatting.raw_content_limit)
        .await;
    progress.finish_and_clear();

    println!("{}", serde_json::to_string_pretty(&response)?);
    match response {
        FormatResponse::Formatted { .. } => Ok(()),
        FormatResponse::Failed { error, .. } => Err(eyre!("formatting failed: {error}")),
    }
}

async fn cmd_activities_list(db: Option<PathBuf>, teacher: &str) -> Result<()> {
    let config = load_config()?;
    let storage = Storage::open_readonly(&resolve_db(&config, db)?).await?;
    let activities = storage.list_activities(teacher).await?;

    if activities.is_empty() {
        println!("No activities for teacher '{teacher}'.");
        return Ok(());
    }

    for activity in activities {
        let questions = activity.content["questions"]
            .as_array()
            .map(Vec::len)
            .unwrap_or(0);
        println!(
            "{}  {}  {:<5} {:<9} {} questions  ({})",
            activity.id,
            activity.created_at.format("%Y-%m-%d %H:%M"),
            activity.class_level,
            activity.status.as_str(),
            questions,
            activity.class_id,
        );
    }
    Ok(())
}

async fn cmd_activities_show(db: Option<PathBuf>, id: &str) -> Result<()> {
    let config = load_config()?;
    let storage = Storage::open_readonly(&resolve_db(&config, db)?).await?;
    let activity = storage
        .get_activity(id)
        .await?
        .ok_or_else(|| eyre!("no activity with id '{id}'"))?;
    let variations = storage.list_variations(id).await?;

    println!("Activity {} ({}, {})", activity.id, activity.activity_type, activity.status.as_str());
    println!("  Class:   {} ({})", activity.class_id, activity.class_level);
    println!("  Teacher: {}", activity.teacher_id);
    println!("  Created: {}", activity.created_at.to_rfc3339());

    if let Some(master) = activity_master(&storage, &activity).await? {
        println!();
        println!("Master question:");
        author::print_question(&master);
    }

    println!();
    println!("Variations ({}):", variations.len());
    for row in variations {
        println!();
        println!("#{}", row.position + 1);
        author::print_question(&row.question);
    }
    Ok(())
}

/// The stored master question row, falling back to the copy embedded in
/// the activity content.
async fn activity_master(storage: &Storage, activity: &ActivityRow) -> Result<Option<Question>> {
    if let Some(master_id) = activity.content["masterQuestionId"].as_str() {
        if let Some(row) = storage.get_master_question(master_id).await? {
            return Ok(Some(row.question));
        }
    }
    Ok(serde_json::from_value(activity.content["masterQuestion"].clone()).ok())
}

async fn cmd_class_enroll(db: Option<PathBuf>, class: &str, student: &str) -> Result<()> {
    let config = load_config()?;
    let storage = Storage::open(&resolve_db(&config, db)?).await?;
    storage.enroll_student(class, student).await?;
    println!("Enrolled '{student}' in class '{class}'.");
    Ok(())
}

async fn cmd_notifications(db: Option<PathBuf>, student: &str) -> Result<()> {
    let config = load_config()?;
    let storage = Storage::open_readonly(&resolve_db(&config, db)?).await?;
    let notifications = storage.list_notifications(student).await?;

    if notifications.is_empty() {
        println!("No notifications for '{student}'.");
        return Ok(());
    }
    for n in notifications {
        let marker = if n.is_read { " " } else { "*" };
        println!(
            "{marker} {}  {}  (activity {})",
            n.created_at.format("%Y-%m-%d %H:%M"),
            n.message,
            n.activity_id
        );
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let path = config_file_path()?;
    if !path.exists() {
        println!("# {} not found, showing defaults", path.display());
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
