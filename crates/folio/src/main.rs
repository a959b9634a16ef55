//! A terminal front end for the portfolio's code-generation assistant.

#[macro_use]
extern crate tracing;

use std::future::Future;
use std::io::Write as _;
use std::time::Duration;

use folio::api::{Message, Role};
use folio::commands::{self, Command, HELP};
use folio::config::CliConfig;
use folio::core::panels::{ImageOutcome, Submission};
use folio::core::store::FileStore;
use folio::core::{DELETE_PROMPT, DeleteApproval, SessionSnapshot};
use folio::render::{BAR_CHAR, Renderer};
use folio::{App, AppBuilder};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt, BufReader, Stdin};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

const TICK: Duration = Duration::from_millis(100);

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = CliConfig::from_env();
    let store = FileStore::open(config.state_file());

    let (approval_tx, approval_rx) = mpsc::unbounded_channel();
    let app = AppBuilder::with_http_config(config.http_config())
        .with_store(store)
        .on_delete_request(move |approval| {
            approval_tx.send(approval).ok();
        })
        .build();

    let mut cli = Cli {
        app,
        renderer: Renderer::new(true),
        input: LineReader::new(),
        approval_rx,
        progress_style: ProgressStyle::with_template("{spinner} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    };

    if let Some(token) = config.id_token() {
        if let Err(err) = cli.app.sign_in(token) {
            cli.print_error(&err.to_string());
        }
    }
    if !cli.app.is_signed_in() {
        println!("Not signed in. Use /login <token> to generate code.");
    }

    let before = SessionSnapshot::default();
    let Some(snapshot) = cli.wait_session(&before).await else {
        return;
    };
    cli.print_transcript(&snapshot);
    println!("Type /help for the list of commands.");

    loop {
        print!("> ");
        flush();

        let Some(line) = cli.input.read_line().await else {
            break;
        };
        let command = match commands::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                cli.print_error(&err.to_string());
                continue;
            }
        };
        if cli.run(command).await.is_none() {
            break;
        }
    }

    cli.app.session().shutdown();
}

struct Cli {
    app: App,
    renderer: Renderer,
    input: LineReader,
    approval_rx: mpsc::UnboundedReceiver<DeleteApproval>,
    progress_style: ProgressStyle,
}

impl Cli {
    /// Runs a command. Returns `None` when the program should exit.
    async fn run(&mut self, command: Command) -> Option<()> {
        let session = self.app.session().clone();
        let before = session.snapshot();
        match command {
            Command::Prompt(text) => {
                session.send_prompt(text);
                let after = self.wait_session(&before).await?;
                if after.active_id == before.active_id
                    && after.transcript.len() >= before.transcript.len()
                {
                    for message in &after.transcript[before.transcript.len()..] {
                        if message.role == Role::Assistant {
                            println!("{}\n", self.renderer.message(message));
                        }
                    }
                } else {
                    self.print_transcript(&after);
                }
            }
            Command::New => {
                session.start_new_conversation();
                let after = self.wait_session(&before).await?;
                if let (Some(id), None) = (after.active_id, &after.notice) {
                    println!("Started conversation #{id}.");
                }
            }
            Command::Select(id) => {
                session.select_conversation(id);
                let after = self.wait_session(&before).await?;
                self.print_transcript(&after);
            }
            Command::Clear => {
                session.clear_conversation();
                self.wait_session(&before).await?;
                println!("Conversation cleared.");
            }
            Command::History => {
                session.reload_history();
                let after = self.wait_session(&before).await?;
                self.print_transcript(&after);
            }
            Command::Delete(id) => {
                session.delete_conversation(id);
                self.wait_session(&before).await?;
            }
            Command::List => {
                session.refresh_conversations();
                let after = self.wait_session(&before).await?;
                if let Some(error) = after.conversations.error() {
                    self.print_error(error);
                }
                if after.conversations.items().is_empty() {
                    println!("No conversations yet.");
                }
                for conversation in after.conversations.items() {
                    let active = after.active_id == Some(conversation.id);
                    println!("{}", self.renderer.conversation(conversation, active));
                }
            }
            Command::Login(token) => match self.app.sign_in(token) {
                Ok(()) => {
                    let after = self.wait_session(&before).await?;
                    println!("Signed in.");
                    self.print_transcript(&after);
                }
                Err(err) => self.print_error(&err.to_string()),
            },
            Command::Logout => {
                self.app.sign_out();
                self.wait_session(&before).await?;
                println!("Signed out.");
            }
            Command::Chat(text) => {
                let chat = self.app.chat();
                let submission = spin(&self.progress_style, "💬 Asking...", chat.submit(&text)).await;
                self.print_reply(submission);
            }
            Command::Captcha(token) => {
                self.app.gated_chat().set_captcha_token(token);
                println!("reCAPTCHA token set.");
            }
            Command::Ask(text) => {
                let gated_chat = self.app.gated_chat();
                let submission = spin(
                    &self.progress_style,
                    "💬 Asking the custom model...",
                    gated_chat.submit(&text),
                )
                .await;
                self.print_reply(submission);
            }
            Command::Image(prompt) => {
                let image = self.app.image();
                let submission =
                    spin(&self.progress_style, "🎨 Painting...", image.submit(&prompt)).await;
                match submission {
                    Submission::Completed(ImageOutcome::Image(image)) => {
                        println!("{}", image.to_url());
                    }
                    Submission::Completed(ImageOutcome::Failed(message))
                    | Submission::Blocked(message) => self.print_error(&message),
                    Submission::Ignored => {}
                }
            }
            Command::Projects => {
                let gallery = self.app.gallery();
                match spin(&self.progress_style, "📂 Loading projects...", gallery.load()).await {
                    Ok(projects) if projects.is_empty() => println!("No projects."),
                    Ok(projects) => {
                        for project in &projects {
                            println!("{}\n", self.renderer.project(project));
                        }
                    }
                    Err(message) => self.print_error(&message),
                }
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => return None,
        }
        Some(())
    }

    /// Waits for the session to settle, showing a spinner and asking for
    /// the confirmation of deletions in the meantime.
    ///
    /// Returns `None` if the session or the input is gone.
    async fn wait_session(
        &mut self,
        before: &SessionSnapshot,
    ) -> Option<SessionSnapshot> {
        let session = self.app.session().clone();
        let mut progress_bar = None;

        let snapshot = loop {
            // Create a new progress bar if it has been finished.
            progress_bar
                .get_or_insert_with(|| {
                    new_spinner(&self.progress_style, "🤔 Thinking...")
                })
                .inc(1);

            let event = select! {
                biased;

                snapshot = session.settled() => break snapshot,
                approval = self.approval_rx.recv() => approval,
                _ = sleep(TICK) => continue,
            };

            // Finish the progress bar before printing anything else.
            if let Some(progress_bar) = progress_bar.take() {
                progress_bar.finish_and_clear();
            }
            if let Some(approval) = event {
                self.confirm_delete(approval).await?;
            }
        };
        if let Some(progress_bar) = progress_bar {
            progress_bar.finish_and_clear();
        }

        let snapshot = snapshot?;
        if let Some(notice) = &snapshot.notice {
            if before.notice.as_ref() != Some(notice) {
                self.print_error(&notice.message);
            }
        }
        Some(snapshot)
    }

    async fn confirm_delete(&mut self, approval: DeleteApproval) -> Option<()> {
        let bar = BAR_CHAR.bright_yellow();
        println!("{bar}⚠️  {}", approval.label().bright_white().bold());
        print!("{bar}{DELETE_PROMPT} [y/N]: ");
        flush();

        let line = self.input.read_line().await?;
        let line = line.trim();
        if line.eq_ignore_ascii_case("y") || line.eq_ignore_ascii_case("yes") {
            approval.approve();
        } else {
            approval.reject();
        }
        Some(())
    }

    fn print_transcript(&self, snapshot: &SessionSnapshot) {
        if snapshot.transcript.is_empty() {
            if let Some(id) = snapshot.active_id {
                println!("Conversation #{id} is empty.");
            }
            return;
        }
        println!("{}\n", self.renderer.transcript(&snapshot.transcript));
    }

    fn print_reply(&self, submission: Submission<Message>) {
        match submission {
            Submission::Completed(message) => {
                println!("{}\n", self.renderer.message(&message));
            }
            Submission::Blocked(message) => self.print_error(&message),
            Submission::Ignored => {}
        }
    }

    fn print_error(&self, message: &str) {
        println!("{}", self.renderer.error(message));
    }
}

/// Reads lines from the standard input, keeping what was buffered between
/// calls.
struct LineReader {
    stdin: BufReader<Stdin>,
}

impl LineReader {
    fn new() -> Self {
        Self {
            stdin: BufReader::new(io::stdin()),
        }
    }

    async fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.stdin.read_line(&mut line).await {
            Ok(0) => None,
            Ok(_) => Some(line),
            Err(err) => {
                error!("error reading input: {}", err);
                None
            }
        }
    }
}

fn new_spinner(style: &ProgressStyle, message: &'static str) -> ProgressBar {
    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(style.clone());
    progress_bar.set_message(message);
    progress_bar
}

async fn spin<F: Future>(
    style: &ProgressStyle,
    message: &'static str,
    fut: F,
) -> F::Output {
    let progress_bar = new_spinner(style, message);
    let mut fut = std::pin::pin!(fut);
    let output = loop {
        progress_bar.inc(1);
        select! {
            output = &mut fut => break output,
            _ = sleep(TICK) => {}
        }
    };
    progress_bar.finish_and_clear();
    output
}

fn flush() {
    if let Err(err) = std::io::stdout().flush() {
        warn!("failed to flush stdout: {err}");
    }
}
