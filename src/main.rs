use std::error::Error;
use std::io::Write;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use tasktree::ClientError;
use tasktree::config::ClientConfig;
use tasktree::core::task::find_task;
use tasktree::core::user::{Credentials, NewUser};
use tasktree::core::{ListId, TaskId};
use tasktree::http::{Gateway, MemoryBackend};
use tasktree::keyring;
use tasktree::notify::{Level, LogNotifier, Notification, Notifier};
use tasktree::refresh::RefreshSignal;
use tasktree::session::Session;
use tasktree::view::{Dashboard, DeleteFlow, ListPage, Route, render_guarded};

const DEMO_USER: &str = "demo";
const DEMO_PASSWORD: &str = "demo";

#[derive(Parser)]
#[command(name = "tasktree", about = "Nested task lists on a tasktree server", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Server API base URL (overrides config and TASKTREE_API_URL; saved by `login`)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Use a throwaway in-memory server with a demo account
    #[arg(long, global = true)]
    offline: bool,

    /// Log debug messages to the journal
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and remember the credentials
    Login(LoginArgs),
    /// Create an account and log in
    Signup(SignupArgs),
    /// Log out and forget the saved credentials
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Show all lists
    Lists,
    /// Add a list
    AddList { name: String },
    /// Rename a list
    RenameList { id: ListId, name: String },
    /// Delete a list and all its tasks
    DeleteList {
        id: ListId,
        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Show the task tree of a list
    Tasks {
        list: ListId,
        /// Only show root tasks
        #[arg(long)]
        collapsed: bool,
    },
    /// Add a root task to a list
    AddTask { list: ListId, name: String },
    /// Add a subtask under another task
    AddSubtask {
        list: ListId,
        parent: TaskId,
        name: String,
    },
    /// Rename a task and optionally set its completion
    EditTask(EditTaskArgs),
    /// Flip a task between done and not done
    Toggle { id: TaskId },
    /// Move a task and its subtasks to another list
    MoveTask { id: TaskId, to: ListId },
    /// Delete a task and its subtasks
    DeleteTask {
        id: TaskId,
        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args)]
struct LoginArgs {
    /// Username or email
    login: String,
    /// Read from stdin when omitted
    #[arg(long)]
    password: Option<String>,
}

#[derive(Args)]
struct SignupArgs {
    username: String,
    email: String,
    /// Display name
    name: String,
    #[arg(long)]
    password: Option<String>,
}

#[derive(Args)]
struct EditTaskArgs {
    list: ListId,
    id: TaskId,
    name: String,
    #[arg(long, conflicts_with = "undone")]
    done: bool,
    #[arg(long)]
    undone: bool,
}

/// Prints notifications to stderr.
struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            Level::Error => {
                log::warn!("{}", notification.message);
                eprintln!("error: {}", notification.message);
            }
            Level::Success | Level::Info => {
                log::info!("{}", notification.message);
                eprintln!("{}", notification.message);
            }
        }
    }
}

fn init_logging(debug: bool) {
    // Journal logger: tasktree at info/debug, everything else at warn.
    // Without a journal (containers, non-systemd hosts) logging stays off.
    struct FilteredJournal {
        inner: systemd_journal_logger::JournalLog,
    }

    impl log::Log for FilteredJournal {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            if metadata.target().starts_with("tasktree") {
                let max = if tasktree::debug_logging() {
                    log::LevelFilter::Debug
                } else {
                    log::LevelFilter::Info
                };
                metadata.level() <= max
            } else {
                metadata.level() <= log::LevelFilter::Warn
            }
        }
        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                self.inner.log(record);
            }
        }
        fn flush(&self) {
            self.inner.flush();
        }
    }

    tasktree::set_debug_logging(debug);

    let Ok(journal) = systemd_journal_logger::JournalLog::new() else {
        return;
    };
    let journal = journal.with_syslog_identifier("tasktree".to_string());
    if log::set_boxed_logger(Box::new(FilteredJournal { inner: journal })).is_ok() {
        log::set_max_level(log::LevelFilter::Debug);
    }
}

fn prompt(question: &str) -> std::io::Result<String> {
    eprint!("{}", question);
    std::io::stderr().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

fn confirm(question: &str) -> std::io::Result<bool> {
    Ok(prompt(&format!("{} [y/n] ", question))?
        .trim()
        .eq_ignore_ascii_case("y"))
}

fn password_or_prompt(password: Option<String>) -> std::io::Result<String> {
    match password {
        Some(p) => Ok(p),
        None => prompt("Password: "),
    }
}

fn demo_backend() -> Result<MemoryBackend, String> {
    let backend = MemoryBackend::new().with_user(DEMO_USER, "demo@example.com", DEMO_PASSWORD);
    backend.seed_list(DEMO_USER, 1, "Inbox")?;
    backend.seed_list(DEMO_USER, 2, "Groceries")?;
    backend.seed_task(1, 1, None, "Try tasktree")?;
    backend.seed_task(2, 1, Some(1), "Add a subtask")?;
    backend.seed_task(3, 1, Some(1), "Move a task to Groceries")?;
    backend.seed_task(4, 2, None, "Milk")?;
    Ok(backend)
}

async fn connect(
    offline: bool,
    config: &ClientConfig,
    notifier: Arc<dyn Notifier>,
) -> Result<Session, Box<dyn Error>> {
    if !offline {
        return Ok(Session::new(Gateway::connect(config, notifier)?));
    }

    let backend = Arc::new(demo_backend()?);
    let mut warmup = Session::new(Gateway::new(backend.clone(), Arc::new(LogNotifier)));
    warmup
        .login(&Credentials::new(DEMO_USER, DEMO_PASSWORD))
        .await?;
    Ok(Session::restore(Gateway::new(backend, notifier)).await)
}

/// Make sure the session is logged in, using saved credentials if needed.
async fn ensure_login(session: &mut Session, api_url: &str) -> Result<(), Box<dyn Error>> {
    if Route::Dashboard.resolve(session.state()) != Route::Login {
        return Ok(());
    }
    match keyring::load_credentials(api_url).await {
        Ok(Some(credentials)) => {
            session.login(&credentials).await?;
            Ok(())
        }
        Ok(None) => Err("Not logged in. Run `tasktree login` first.".into()),
        Err(e) => {
            log::warn!("{}", e);
            Err(format!("Not logged in and no saved credentials: {}", e).into())
        }
    }
}

async fn remember(api_url: &str, credentials: &Credentials) {
    if let Err(e) = keyring::store_credentials(api_url, credentials).await {
        log::warn!("{}", e);
        eprintln!("warning: credentials not saved: {}", e);
    }
}

async fn run(cli: Cli, config: ClientConfig, notifier: Arc<dyn Notifier>) -> Result<(), Box<dyn Error>> {
    let api_url = config.api_url.clone();
    let offline = cli.offline;
    let url_flag = cli.api_url.is_some();
    let mut session = connect(offline, &config, notifier.clone()).await?;
    let refresh = RefreshSignal::new();

    match cli.command {
        Command::Login(args) => {
            let credentials = Credentials::new(args.login, password_or_prompt(args.password)?);
            session.login(&credentials).await?;
            if !offline {
                remember(&api_url, &credentials).await;
                if url_flag {
                    // Later commands reach the same server without the flag.
                    if let Err(e) = ClientConfig::persist_api_url(&ClientConfig::config_path(), &api_url) {
                        log::warn!("Failed to save config: {}", e);
                        eprintln!("warning: API URL not saved: {}", e);
                    }
                }
            }
        }
        Command::Signup(args) => {
            let new_user = NewUser {
                username: args.username,
                email: args.email,
                password: password_or_prompt(args.password)?,
                name: args.name,
            };
            session.signup(&new_user).await?;
            if !offline {
                remember(&api_url, &new_user.credentials()).await;
            }
        }
        Command::Logout => {
            ensure_login(&mut session, &api_url).await?;
            session.logout().await?;
            if !offline {
                keyring::delete_credentials(&api_url).await?;
            }
        }
        Command::Whoami => {
            ensure_login(&mut session, &api_url).await?;
            match session.fetch_current_user().await? {
                Some(user) => {
                    println!("{} ({})", user.display_name(), user.username);
                    if let Some(email) = &user.email {
                        println!("{}", email);
                    }
                }
                None => println!("Not logged in."),
            }
        }
        Command::Lists => {
            ensure_login(&mut session, &api_url).await?;
            let mut dashboard = Dashboard::new(session.lists(&refresh)?, &refresh);
            dashboard.sync().await?;
            print!("{}", render_guarded(notifier.as_ref(), || dashboard.render()));
        }
        Command::AddList { name } => {
            ensure_login(&mut session, &api_url).await?;
            let mut dashboard = Dashboard::new(session.lists(&refresh)?, &refresh);
            dashboard.set_add_open(true);
            dashboard.submit_add(&name).await?;
        }
        Command::RenameList { id, name } => {
            ensure_login(&mut session, &api_url).await?;
            let mut dashboard = Dashboard::new(session.lists(&refresh)?, &refresh);
            dashboard.set_edit_open(id, true);
            dashboard.submit_rename(id, &name).await?;
        }
        Command::DeleteList { id, yes } => {
            ensure_login(&mut session, &api_url).await?;
            let mut dashboard = Dashboard::new(session.lists(&refresh)?, &refresh);
            dashboard.sync().await?;
            let Some(list) = dashboard.lists().iter().find(|l| l.id == id).cloned() else {
                return Err(ClientError::Validation(format!("No list {}", id)).into());
            };

            dashboard.request_delete(id);
            if yes || confirm(&format!("Delete list \"{}\" and all its tasks?", list.name))? {
                dashboard.confirm_delete(id).await?;
            } else {
                dashboard.cancel_delete(id);
                println!("cancelled");
            }
        }
        Command::Tasks { list, collapsed } => {
            ensure_login(&mut session, &api_url).await?;
            let mut page = ListPage::new(list, session.lists(&refresh)?, session.tasks(&refresh)?, &refresh);
            page.sync().await?;
            if !collapsed {
                let tree = page.tree().to_vec();
                page.view_mut().expand_all(&tree);
            }
            print!("{}", render_guarded(notifier.as_ref(), || page.render()));
        }
        Command::AddTask { list, name } => {
            ensure_login(&mut session, &api_url).await?;
            session.tasks(&refresh)?.add_task(list, &name).await?;
        }
        Command::AddSubtask { list, parent, name } => {
            ensure_login(&mut session, &api_url).await?;
            session.tasks(&refresh)?.add_subtask(parent, list, &name).await?;
        }
        Command::EditTask(args) => {
            ensure_login(&mut session, &api_url).await?;
            let tasks = session.tasks(&refresh)?;
            let completed = if args.done {
                true
            } else if args.undone {
                false
            } else {
                let tree = tasks.get_tasks(args.list).await?;
                find_task(&tree, args.id)
                    .map(|t| t.completed)
                    .ok_or_else(|| ClientError::Validation(format!("No task {} in list {}", args.id, args.list)))?
            };
            tasks.edit_task(args.id, &args.name, completed).await?;
        }
        Command::Toggle { id } => {
            ensure_login(&mut session, &api_url).await?;
            session.tasks(&refresh)?.toggle_completion(id).await?;
        }
        Command::MoveTask { id, to } => {
            ensure_login(&mut session, &api_url).await?;
            session.tasks(&refresh)?.move_task(id, to).await?;
        }
        Command::DeleteTask { id, yes } => {
            ensure_login(&mut session, &api_url).await?;
            let tasks = session.tasks(&refresh)?;
            let mut flow = DeleteFlow::default();
            flow.request();
            if yes || confirm(&format!("Delete task {} and its subtasks?", id))? {
                flow.confirm_with(|| async move { tasks.delete_task(id).await })
                    .await?;
            } else {
                flow.cancel();
                println!("cancelled");
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut config = ClientConfig::load();
    if let Some(url) = &cli.api_url {
        config.apply_api_url(url);
    }
    init_logging(cli.debug || config.debug_logging);

    let notifier: Arc<dyn Notifier> = Arc::new(StderrNotifier);
    if let Err(e) = run(cli, config, notifier).await {
        // Server-side failures were already shown by the notifier.
        let shown = e.downcast_ref::<ClientError>().is_some_and(|e| {
            matches!(
                e,
                ClientError::Api { .. } | ClientError::Transport(_) | ClientError::Decode(_)
            )
        });
        if !shown {
            eprintln!("error: {}", e);
        }
        std::process::exit(1);
    }

    Ok(())
}
