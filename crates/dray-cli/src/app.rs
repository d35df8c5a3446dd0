use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use chrono::Local;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use dray_core::config::{self, Config};
use dray_core::datetime::parse_cli_date;
use dray_core::history::{self, DateRange, FilterField, OrderField};
use dray_core::render::Renderer;
use dray_remote::auth::AuthClient;
use dray_remote::feed::{RecordSource, RemoteFeed, UiState};
use dray_remote::rest::RestClient;
use dray_remote::session::SessionStore;
use dray_remote::sources::{ClientListSource, TaskHistorySource, TaskListSource};

#[derive(Parser, Debug)]
#[command(
    name = "dray",
    version,
    about = "Delivery task client for the hosted table backend"
)]
pub struct Cli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and store the session for later invocations.
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// Clear the stored session, with a best-effort remote sign-out.
    Logout,
    /// List the current tasks.
    Tasks {
        /// Only rows belonging to this backend user id.
        #[arg(long)]
        user: Option<i64>,
    },
    /// Show the task history, optionally filtered to a date window.
    History {
        /// Inclusive window start (YYYY-MM-DD).
        #[arg(long)]
        from: Option<String>,
        /// Inclusive window end (YYYY-MM-DD).
        #[arg(long)]
        to: Option<String>,
        /// Which date column the window applies to.
        #[arg(long = "filter-by", value_enum, default_value_t = FilterField::Deadline)]
        filter_by: FilterField,
        /// Which column orders the output.
        #[arg(long = "order-by", value_enum, default_value_t = OrderField::Deadline)]
        order_by: OrderField,
    },
    /// List the client directory.
    Clients,
    /// Show one task in detail.
    Task { id: i64 },
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    let cfg = Config::load(cli.config.as_deref())?;
    let data_dir =
        config::resolve_data_dir(&cfg).context("failed to resolve data directory")?;
    let sessions = SessionStore::new(&data_dir);

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(dispatch(cli.command, &cfg, &sessions))
}

fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

async fn dispatch(command: Command, cfg: &Config, sessions: &SessionStore) -> anyhow::Result<()> {
    match command {
        Command::Login { email, password } => login(cfg, sessions, &email, password).await,
        Command::Logout => logout(cfg, sessions).await,
        Command::Tasks { user } => tasks(cfg, sessions, user).await,
        Command::History {
            from,
            to,
            filter_by,
            order_by,
        } => history_view(cfg, sessions, from, to, filter_by, order_by).await,
        Command::Clients => clients(cfg, sessions).await,
        Command::Task { id } => task_detail(cfg, sessions, id).await,
    }
}

fn rest_client(cfg: &Config, sessions: &SessionStore) -> anyhow::Result<RestClient> {
    let rest = RestClient::new(&cfg.backend)?;
    Ok(match sessions.load() {
        Some(session) => {
            debug!(user = %session.user.id, "resuming stored session");
            rest.with_access_token(session.access_token)
        }
        None => rest,
    })
}

async fn fetch_settled<S: RecordSource>(source: S) -> anyhow::Result<Vec<S::Record>> {
    let feed = RemoteFeed::new(source);
    feed.refresh().await;
    settled_items(feed.snapshot())
}

fn settled_items<T>(state: UiState<T>) -> anyhow::Result<Vec<T>> {
    match state.error {
        Some(message) => Err(anyhow!(message)),
        None => Ok(state.items),
    }
}

async fn login(
    cfg: &Config,
    sessions: &SessionStore,
    email: &str,
    password: Option<String>,
) -> anyhow::Result<()> {
    let password = match password {
        Some(password) => password,
        None => read_password_from_stdin()?,
    };

    let auth = AuthClient::new(&cfg.backend)?;
    let session = auth.login(email, &password).await?;
    sessions.save(&session)?;

    println!("signed in as {} ({})", session.user.email, session.user.id);
    Ok(())
}

async fn logout(cfg: &Config, sessions: &SessionStore) -> anyhow::Result<()> {
    if let Some(session) = sessions.load() {
        let auth = AuthClient::new(&cfg.backend)?;
        auth.logout(&session).await;
    }
    sessions.clear()?;

    println!("signed out");
    Ok(())
}

async fn tasks(cfg: &Config, sessions: &SessionStore, user: Option<i64>) -> anyhow::Result<()> {
    let rest = rest_client(cfg, sessions)?;
    let mut source = TaskListSource::new(rest, cfg.backend.task_table.clone());
    if let Some(user) = user {
        source = source.for_user(user);
    }

    let rows = fetch_settled(source).await?;
    if rows.is_empty() {
        println!("no tasks");
        return Ok(());
    }

    Renderer::new(&cfg.output).print_task_table(&rows, Local::now().date_naive())
}

async fn history_view(
    cfg: &Config,
    sessions: &SessionStore,
    from: Option<String>,
    to: Option<String>,
    filter_by: FilterField,
    order_by: OrderField,
) -> anyhow::Result<()> {
    let range = DateRange {
        start: from.as_deref().map(parse_cli_date).transpose()?,
        end: to.as_deref().map(parse_cli_date).transpose()?,
    };

    let rest = rest_client(cfg, sessions)?;
    let rows = fetch_settled(TaskHistorySource::new(rest, cfg.backend.task_table.clone())).await?;

    let view = history::derive(&rows, &range, filter_by, order_by);
    if view.is_empty() {
        println!("no tasks in range");
        return Ok(());
    }

    Renderer::new(&cfg.output).print_task_table(&view, Local::now().date_naive())
}

async fn clients(cfg: &Config, sessions: &SessionStore) -> anyhow::Result<()> {
    let rest = rest_client(cfg, sessions)?;
    let rows = fetch_settled(ClientListSource::new(rest, cfg.backend.client_table.clone())).await?;

    if rows.is_empty() {
        println!("no clients");
        return Ok(());
    }

    Renderer::new(&cfg.output).print_client_table(&rows)
}

async fn task_detail(cfg: &Config, sessions: &SessionStore, id: i64) -> anyhow::Result<()> {
    let rest = rest_client(cfg, sessions)?;
    let rows = fetch_settled(TaskListSource::new(rest, cfg.backend.task_table.clone())).await?;

    let task = rows
        .iter()
        .find(|row| row.id == id)
        .ok_or_else(|| anyhow!("task {id} not found"))?;

    Renderer::new(&cfg.output).print_task_detail(task)
}

fn read_password_from_stdin() -> anyhow::Result<String> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        eprint!("password: ");
        std::io::stderr().flush().ok();
    }

    let mut line = String::new();
    stdin
        .lock()
        .read_line(&mut line)
        .context("failed reading password from stdin")?;

    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err(anyhow!("empty password"));
    }
    Ok(password)
}
