use std::env;
use std::io::{self, Write};
use std::time::Duration;

use clap::{CommandFactory, Parser};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chatline::cli::{resolve_config, Args};
use chatline::config::API_URL_ENV;
use chatline::message::ConnectionStatus;
use chatline::render;
use chatline::{Background, ChatApi, ChatSession, Completed, ConnectionEvent, Dispatch, SendOutcome};

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Prints whatever changed in the session since the last call.
struct View {
    printed: usize,
    status: Option<ConnectionStatus>,
    warning: Option<String>,
    pending: bool,
}

impl View {
    fn new() -> Self {
        Self {
            printed: 0,
            status: None,
            warning: None,
            pending: false,
        }
    }

    fn refresh(&mut self, session: &ChatSession) {
        let mut out = io::stdout().lock();

        if self.status != Some(session.status()) {
            self.status = Some(session.status());
            let _ = writeln!(out, "{}", render::status_badge(session.status()));
        }

        let warning = session.warning().map(str::to_string);
        if warning != self.warning {
            if let Some(text) = &warning {
                let _ = writeln!(out, "{}", render::warning_banner(text));
            }
            self.warning = warning;
        }

        for message in session.transcript().since(self.printed) {
            let _ = writeln!(out, "{}", render::message_line(message));
        }
        self.printed = session.transcript().len();

        if session.is_pending() && !self.pending {
            let _ = writeln!(out, "{}", render::thinking());
        }
        self.pending = session.is_pending();
        let _ = out.flush();
    }
}

enum Flow {
    Continue,
    Quit,
}

/// How long piped input waits, after EOF, for replies still owed.
const EOF_GRACE: Duration = Duration::from_secs(30);

fn handle_line(
    session: &mut ChatSession,
    view: &mut View,
    background: &mut Background,
    line: &str,
) -> Flow {
    match line.trim() {
        "/quit" | "/exit" => return Flow::Quit,
        "/help" => println!("{}", render::help()),
        "/dismiss" => session.dismiss_warning(),
        "/stats" => background.spawn_stats(session.api(), true),
        "/health" => background.spawn_health(session.api()),
        _ => match session.submit(line) {
            Dispatch::Ignored => return Flow::Continue,
            Dispatch::Streamed => {}
            Dispatch::Fallback(frame) => background.spawn_chat(session.api(), frame),
        },
    }
    view.refresh(session);
    Flow::Continue
}

fn apply(session: &mut ChatSession, completed: Completed) {
    match completed {
        Completed::Chat(result) => {
            if let SendOutcome::Failed(e) = session.complete_fallback(result) {
                info!(error = %e, "message kept locally, not delivered");
            }
        }
        Completed::Stats { result, announce } => match session.apply_stats(result) {
            Some(stats) => println!("{}", render::stats_line(stats)),
            None if announce => println!("{}", render::warning_banner("stats unavailable")),
            None => {}
        },
        Completed::Health(Ok(report)) => println!("{}", render::health_line(&report)),
        Completed::Health(Err(e)) => println!("{}", render::warning_banner(&e.to_string())),
    }
}

/// Next channel event, or never when there is no channel (or it has ended).
async fn next_event(
    events: &mut Option<mpsc::UnboundedReceiver<ConnectionEvent>>,
) -> ConnectionEvent {
    if let Some(rx) = events {
        if let Some(event) = rx.recv().await {
            return event;
        }
        *events = None;
    }
    std::future::pending().await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(shell) = args.completions {
        clap_complete::generate(shell, &mut Args::command(), "chatline", &mut io::stdout());
        return Ok(());
    }

    init_logging(args.verbose);

    let config = resolve_config(&args, env::var(API_URL_ENV).ok())?;
    info!(api_base = %config.api_base, "starting session");

    let mut session = ChatSession::new(ChatApi::new(&config));
    let mut events = if args.http_only {
        None
    } else {
        Some(session.open_channel(&config))
    };

    println!("{}", render::header(&session.conversation_id().to_string()));
    println!("{}", render::welcome());

    let mut view = View::new();
    let mut background = Background::new();
    background.spawn_stats(session.api(), false);
    view.refresh(&session);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = LinesStream::new(stdin.lines());
    let mut stdin_closed = false;
    let grace = tokio::time::sleep(EOF_GRACE);
    tokio::pin!(grace);

    loop {
        tokio::select! {
            line = lines.next(), if !stdin_closed => match line {
                Some(Ok(line)) => {
                    if let Flow::Quit = handle_line(&mut session, &mut view, &mut background, &line) {
                        break;
                    }
                }
                Some(Err(e)) => {
                    error!(error = %e, "failed to read stdin");
                    break;
                }
                // Piped input: let replies still owed land before exiting.
                None => {
                    if background.settled(&session) {
                        break;
                    }
                    stdin_closed = true;
                    grace.as_mut().reset(Instant::now() + EOF_GRACE);
                }
            },
            Some(completed) = background.next() => {
                apply(&mut session, completed);
                view.refresh(&session);
            }
            event = next_event(&mut events) => {
                session.handle_event(event);
                view.refresh(&session);
            }
            _ = &mut grace, if stdin_closed => {
                info!("gave up waiting for outstanding replies");
                break;
            }
            _ = tokio::signal::ctrl_c() => break,
        }

        if stdin_closed && background.settled(&session) {
            break;
        }
    }

    session.shutdown().await;
    Ok(())
}
