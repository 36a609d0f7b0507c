//! quizmark CLI: grade quizzes, issue generated quizzes, and track rank.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "quizmark", version, about = "Quiz grading and rank tracking")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate quiz TOML files
    Validate {
        /// Path to a quiz file or directory
        #[arg(long)]
        quiz: PathBuf,
    },

    /// Grade a learner's answers and record the result
    Grade {
        #[command(flatten)]
        source: commands::QuizSource,

        /// Answers file with an [answers] table
        #[arg(long)]
        answers: PathBuf,

        /// Learner id
        #[arg(long)]
        learner: String,

        /// Session file written by `quizmark start` (generated quizzes)
        #[arg(long)]
        session: Option<PathBuf>,

        /// Gradebook file (defaults to `store_path` from config)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Generate questions of a generated quiz for one learner
    Start {
        #[command(flatten)]
        source: commands::QuizSource,

        /// Learner id
        #[arg(long)]
        learner: String,

        /// Where to save the issued questions
        #[arg(long)]
        session: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Draft a multiple-choice quiz from teaching material
    Draft {
        /// Plain-text material to write questions about
        #[arg(long)]
        material: PathBuf,

        /// Id of the new quiz
        #[arg(long)]
        id: String,

        /// Title of the new quiz
        #[arg(long)]
        title: String,

        /// Subject the quiz counts towards
        #[arg(long)]
        subject: Option<String>,

        /// Number of questions to ask for
        #[arg(long, default_value = "5")]
        count: usize,

        /// Output quiz file
        #[arg(long)]
        output: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Recompute and show a learner's rank
    Rank {
        #[arg(long)]
        learner: String,

        #[arg(long)]
        store: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show a learner's subject progress and summary
    Progress {
        #[arg(long)]
        learner: String,

        #[arg(long)]
        store: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show learners ordered by lifetime score
    Leaderboard {
        /// Max rows to show
        #[arg(long, default_value = "10")]
        limit: usize,

        #[arg(long)]
        store: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Delete every result, progress entry and rank of a learner
    RemoveLearner {
        #[arg(long)]
        learner: String,

        #[arg(long)]
        store: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example quizzes
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quizmark=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { quiz } => commands::validate::execute(quiz),
        Commands::Grade {
            source,
            answers,
            learner,
            session,
            store,
            config,
        } => commands::grade::execute(source, answers, learner, session, store, config).await,
        Commands::Start {
            source,
            learner,
            session,
            config,
        } => commands::start::execute(source, learner, session, config).await,
        Commands::Draft {
            material,
            id,
            title,
            subject,
            count,
            output,
            config,
        } => commands::draft::execute(material, id, title, subject, count, output, config).await,
        Commands::Rank {
            learner,
            store,
            config,
        } => commands::standing::rank(learner, store, config).await,
        Commands::Progress {
            learner,
            store,
            config,
        } => commands::standing::progress(learner, store, config).await,
        Commands::Leaderboard {
            limit,
            store,
            config,
        } => commands::standing::leaderboard(limit, store, config).await,
        Commands::RemoveLearner {
            learner,
            store,
            config,
        } => commands::standing::remove_learner(learner, store, config).await,
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
