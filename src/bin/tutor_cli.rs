use std::path::PathBuf;

use serde_json::Value;
use student_tutor::{
    config::Config,
    db,
    lesson::{self, NewLesson},
    progress::{self, NewProgress},
    quiz::{self, NewQuiz},
    tutor::{AgentDescriptor, SessionState},
    user::{self, Role},
    utils::init_log,
};
use clap::Parser;
use sqlx::SqlitePool;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, clap::Parser)]
struct Args {
    #[command(subcommand)]
    command: Commands,
    /// Path to database file, defaults to the configured one
    #[arg(short, long)]
    database: Option<PathBuf>,
    #[arg(short, long, default_value = "tutor.toml")]
    config: PathBuf,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
    Lesson {
        #[command(subcommand)]
        command: LessonCommand,
    },
    Quiz {
        #[command(subcommand)]
        command: QuizCommand,
    },
    Progress {
        #[command(subcommand)]
        command: ProgressCommand,
    },
    /// Print the agent descriptor as JSON
    Agent,
    /// Call tutor tools interactively: `<tool> <json args>` per line, `exit` to quit
    Tutor {
        /// Seed the session with this student's progress
        #[arg(short, long)]
        student: Option<i64>,
    },
}

#[derive(Debug, clap::Subcommand)]
enum UserCommand {
    List {
        #[arg(short, long)]
        role: Option<Role>,
    },
    Create {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long, default_value = "student")]
        role: Role,
    },
    SetRole {
        id: i64,
        role: Role,
    },
    Delete {
        id: i64,
    },
}

#[derive(Debug, clap::Subcommand)]
enum LessonCommand {
    List {
        #[arg(short, long)]
        student: Option<i64>,
    },
    Create {
        #[arg(short, long)]
        student: i64,
        #[arg(short, long)]
        topic: String,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long)]
        slides_url: Option<String>,
        #[arg(long)]
        doc_url: Option<String>,
    },
    Delete {
        id: i64,
    },
}

#[derive(Debug, clap::Subcommand)]
enum QuizCommand {
    List {
        lesson: i64,
    },
    Create {
        #[arg(short, long)]
        lesson: i64,
        #[arg(short, long)]
        title: String,
        #[arg(short, long)]
        form_url: String,
    },
    Delete {
        id: i64,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ProgressCommand {
    Show {
        student: i64,
    },
    Record {
        #[arg(short, long)]
        student: i64,
        #[arg(short, long)]
        quiz: i64,
        #[arg(long)]
        score: Option<f64>,
        #[arg(short, long)]
        feedback: Option<String>,
    },
    Delete {
        id: i64,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("{:?}", e);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let _guard = init_log(None)?;
    let config = Config::load(Some(&args.config))?;
    let database = db::open(args.database.unwrap_or(config.database)).await?;

    match args.command {
        Commands::User { command } => match command {
            UserCommand::List { role } => {
                for user in user::list_users(&database, role).await? {
                    println!(
                        "{:<8} {:<10} {:<20} {}",
                        user.id, user.role, user.username, user.email
                    );
                }
            }
            UserCommand::Create { name, email, role } => {
                let user = user::create_user(&database, name, email, role).await?;
                println!("User created with id: {}", user.id);
            }
            UserCommand::SetRole { id, role } => {
                match user::update_user(&database, id, None, Some(role)).await? {
                    Some(user) => println!("User {} is now {}", user.id, user.role),
                    None => println!("No user with id: {}", id),
                }
            }
            UserCommand::Delete { id } => {
                if user::delete_user(&database, id).await? {
                    println!("User deleted with id: {}", id);
                } else {
                    println!("No user with id: {}", id);
                }
            }
        },
        Commands::Lesson { command } => match command {
            LessonCommand::List { student } => {
                for lesson in lesson::list_lessons(&database, student).await? {
                    println!("{:<8} {:<8} {}", lesson.id, lesson.student_id, lesson.topic);
                }
            }
            LessonCommand::Create {
                student,
                topic,
                description,
                slides_url,
                doc_url,
            } => {
                let lesson = lesson::create_lesson(
                    &database,
                    NewLesson {
                        student_id: student,
                        topic,
                        description,
                        slides_url,
                        doc_url,
                    },
                )
                .await?;
                println!("Lesson created with id: {}", lesson.id);
            }
            LessonCommand::Delete { id } => {
                if lesson::delete_lesson(&database, id).await? {
                    println!("Lesson deleted with id: {}", id);
                } else {
                    println!("No lesson with id: {}", id);
                }
            }
        },
        Commands::Quiz { command } => match command {
            QuizCommand::List { lesson } => {
                for quiz in quiz::list_quizzes(&database, lesson).await? {
                    println!("{:<8} {:<30} {}", quiz.id, quiz.title, quiz.form_url);
                }
            }
            QuizCommand::Create {
                lesson,
                title,
                form_url,
            } => {
                let quiz = quiz::create_quiz(
                    &database,
                    NewQuiz {
                        lesson_id: lesson,
                        form_url,
                        title,
                    },
                )
                .await?;
                println!("Quiz created with id: {}", quiz.id);
            }
            QuizCommand::Delete { id } => {
                if quiz::delete_quiz(&database, id).await? {
                    println!("Quiz deleted with id: {}", id);
                } else {
                    println!("No quiz with id: {}", id);
                }
            }
        },
        Commands::Progress { command } => match command {
            ProgressCommand::Show { student } => {
                let report = progress::summarize_for_student(&database, student).await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            ProgressCommand::Record {
                student,
                quiz,
                score,
                feedback,
            } => {
                let record = progress::record_progress(
                    &database,
                    NewProgress {
                        student_id: student,
                        quiz_id: quiz,
                        score,
                        feedback,
                    },
                )
                .await?;
                println!("Progress recorded with id: {}", record.id);
            }
            ProgressCommand::Delete { id } => {
                if progress::delete_progress(&database, id).await? {
                    println!("Progress record deleted with id: {}", id);
                } else {
                    println!("No progress record with id: {}", id);
                }
            }
        },
        Commands::Agent => {
            let agent = AgentDescriptor::student_tutor(config.tutor.model);
            println!("{}", serde_json::to_string_pretty(&agent.manifest())?);
        }
        Commands::Tutor { student } => {
            let agent = AgentDescriptor::student_tutor(config.tutor.model);
            let state = seed_state(&database, student).await?;
            start_tutoring(agent, state).await?;
        }
    }
    Ok(())
}

async fn seed_state(database: &SqlitePool, student: Option<i64>) -> anyhow::Result<SessionState> {
    let Some(student) = student else {
        return Ok(SessionState::default());
    };
    let report = progress::summarize_for_student(database, student).await?;
    Ok(SessionState::with_progress(serde_json::to_value(report)?))
}

async fn start_tutoring(agent: AgentDescriptor, mut state: SessionState) -> anyhow::Result<()> {
    println!("Tools: {}", agent.tools.names().join(", "));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        println!("\n[Student]:");
        let Some(input) = lines.next_line().await? else {
            break;
        };
        let input = input.trim();
        if input == "exit" {
            break;
        }
        if input.is_empty() {
            continue;
        }
        let (name, args) = input.split_once(' ').unwrap_or((input, ""));
        let args = if args.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(args) {
                Ok(args) => args,
                Err(e) => {
                    println!("\n[Error]:\ninvalid JSON arguments: {}", e);
                    continue;
                }
            }
        };
        match agent.call_tool(name, args, &mut state) {
            Ok(result) => {
                println!("\n[Tool result]:\n{}", serde_json::to_string_pretty(&result)?)
            }
            Err(e) => println!("\n[Error]:\n{}", e),
        }
    }
    Ok(())
}
