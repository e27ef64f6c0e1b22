use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use taskdesk_core::{ApiError, ClientConfig, CreateTask, Credentials, ErrorKind, TaskDeskClient, UpdateTask};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "taskdesk")]
#[command(about = "Command-line client for the task service", long_about = None)]
struct Cli {
    /// Primary backend base URL; local fallbacks are tried after it.
    /// Defaults to TASKDESK_API_BASE_URL or http://localhost:8000.
    #[arg(short, long)]
    url: Option<String>,

    /// Bearer token printed by `taskdesk login`
    #[arg(short, long, env = "TASKDESK_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find a reachable backend and check its health endpoint
    Check,
    /// Create an account
    Register { email: String, password: String },
    /// Sign in and print the access token
    Login { email: String, password: String },
    /// Show the user the token belongs to
    Whoami,
    /// Manage tasks
    Tasks {
        #[command(subcommand)]
        command: TaskCommand,
    },
}

#[derive(Subcommand)]
enum TaskCommand {
    List,
    Add {
        title: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    Show { id: Uuid },
    Edit {
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    Done { id: Uuid },
    Undo { id: Uuid },
    Rm { id: Uuid },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskdesk=info,taskdesk_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &cli.url {
        config = config.with_primary_url(url);
    }
    tracing::debug!(candidates = ?config.candidates(), "client configured");
    let client = TaskDeskClient::new(config);

    match run(&client, cli.token.as_deref(), cli.command).await {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast_ref::<ApiError>() {
            Some(api) => bail!("{}{}", api, hint(api.kind())),
            None => Err(e),
        },
    }
}

async fn run(client: &TaskDeskClient, token: Option<&str>, command: Commands) -> anyhow::Result<()> {
    let auth = client.auth();
    let tasks = client.tasks();

    match command {
        Commands::Check => {
            let url = client.backend().resolve_endpoint().await;
            if !auth.test_connection().await {
                bail!("backend at {url} is not healthy");
            }
            println!("backend healthy at {url}");
        }
        Commands::Register { email, password } => {
            let user = auth.register(&Credentials::new(email, password)).await?;
            print_json(&user)?;
        }
        Commands::Login { email, password } => {
            let token = auth.login(&Credentials::new(email, password)).await?;
            tracing::info!(user = %token.user.email, "signed in");
            println!("{}", token.access_token);
        }
        Commands::Whoami => {
            let user = auth.get_current_user(require(token)?).await?;
            print_json(&user)?;
        }
        Commands::Tasks { command } => {
            let token = require(token)?;
            match command {
                TaskCommand::List => print_json(&tasks.list_tasks(token).await?)?,
                TaskCommand::Add { title, description } => {
                    let input = CreateTask {
                        title,
                        description,
                        completed: false,
                    };
                    print_json(&tasks.create_task(token, &input).await?)?;
                }
                TaskCommand::Show { id } => print_json(&tasks.get_task(token, id).await?)?,
                TaskCommand::Edit { id, title, description } => {
                    let input = UpdateTask {
                        title,
                        description,
                        completed: None,
                    };
                    print_json(&tasks.update_task(token, id, &input).await?)?;
                }
                TaskCommand::Done { id } => print_json(&tasks.set_completion(token, id, true).await?)?,
                TaskCommand::Undo { id } => print_json(&tasks.set_completion(token, id, false).await?)?,
                TaskCommand::Rm { id } => {
                    tasks.delete_task(token, id).await?;
                    println!("deleted {id}");
                }
            }
        }
    }
    Ok(())
}

fn require(token: Option<&str>) -> anyhow::Result<&str> {
    token.context("no token: pass --token or set TASKDESK_TOKEN (see `taskdesk login`)")
}

fn hint(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Unreachable => "\nhint: start the backend or point --url at it",
        ErrorKind::Timeout => "\nhint: the backend may still be starting; try again shortly",
        ErrorKind::Application | ErrorKind::Unexpected => "",
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
