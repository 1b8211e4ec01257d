use anyhow::Context;
use chatline::config::ChatlineConfig;
use chatline::formatter::{format_banner, format_entry, format_input_line, format_login_error};
use chatline::keybindings::key_action;
use chatline::{Collaborator, Shell, ShellSignal, TcpCollaborator};
use clap::Parser;
use crossterm::event::{self, Event};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

mod terminal;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Chat shell with command completion.
#[derive(Debug, Parser)]
#[command(name = "chatline", version)]
struct Opt {
    /// Server host
    #[arg(long)]
    host: Option<String>,

    /// Server port
    #[arg(long, short)]
    port: Option<u16>,

    /// Nickname to register with
    #[arg(long, short)]
    nick: Option<String>,

    /// Config file to use instead of ~/.chatline/chatline.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the debug log
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Show HH:MM:SS before each line
    #[arg(long)]
    timestamps: bool,

    /// Save the session log to this file on exit
    #[arg(long)]
    transcript: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();

    let mut config = match &opt.config {
        Some(path) => ChatlineConfig::load_from(path),
        None => ChatlineConfig::load(),
    };
    if let Some(host) = opt.host {
        config.host = host;
    }
    if let Some(port) = opt.port {
        config.port = port;
    }
    if opt.nick.is_some() {
        config.nickname = opt.nick;
    }
    config.show_timestamps |= opt.timestamps;

    init_logging(opt.log_file)?;
    log::info!("chatline starting, server {}:{}", config.host, config.port);

    let mut shell = Shell::new(TcpCollaborator::new(config.clone()));
    let Some(username) = login(&mut shell, &config)? else {
        return Ok(());
    };
    run(&mut shell, &config, &username)?;

    if let Some(path) = opt.transcript {
        shell
            .log()
            .save_transcript(&path, config.show_timestamps)
            .with_context(|| format!("saving transcript to {}", path.display()))?;
        println!("Transcripción guardada en {}", path.display());
    }
    Ok(())
}

/// Logs go to a file: the terminal is in raw mode while the shell runs.
fn init_logging(path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(|| {
        dirs_next::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".chatline")
            .join("chatline.log")
    });
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

/// Prompt for a nickname until login succeeds. `None` when stdin closes.
fn login<C: Collaborator>(
    shell: &mut Shell<C>,
    config: &ChatlineConfig,
) -> anyhow::Result<Option<String>> {
    let mut nickname = config.nickname.clone();
    let stdin = io::stdin();
    loop {
        let nick = match nickname.take() {
            Some(nick) => nick,
            None => {
                print!("Nombre de usuario: ");
                io::stdout().flush()?;
                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 {
                    return Ok(None);
                }
                line.trim().to_string()
            }
        };

        match shell.login(&config.host, config.port, &nick) {
            Ok(username) => return Ok(Some(username)),
            Err(failure) => {
                log::warn!("login as {nick:?} failed: {failure}");
                println!("{}", format_login_error(&failure.0));
            }
        }
    }
}

fn run<C: Collaborator>(
    shell: &mut Shell<C>,
    config: &ChatlineConfig,
    username: &str,
) -> anyhow::Result<()> {
    let guard = terminal::RawModeGuard::enable().context("entering raw mode")?;
    let mut out = io::stdout();
    write!(out, "{}", format_banner(username))?;

    let mut shown = 0;
    shell.pump_events();
    render(&mut out, shell, &mut shown, config.show_timestamps)?;

    loop {
        let mut dirty = shell.pump_events() > 0;
        if event::poll(POLL_INTERVAL)? {
            match event::read()? {
                Event::Key(key) => {
                    if let Some(action) = key_action(&key) {
                        if shell.on_key(action) == ShellSignal::Exit {
                            break;
                        }
                        dirty = true;
                    }
                }
                Event::Resize(..) => dirty = true,
                _ => {}
            }
        }
        if dirty {
            render(&mut out, shell, &mut shown, config.show_timestamps)?;
        }
    }

    shell.pump_events();
    render(&mut out, shell, &mut shown, config.show_timestamps)?;
    write!(out, "\r\n")?;
    out.flush()?;
    drop(guard);
    log::info!("chatline exiting");
    Ok(())
}

/// Print log entries not shown yet above the input line, then redraw it.
fn render<C: Collaborator>(
    out: &mut impl Write,
    shell: &Shell<C>,
    shown: &mut usize,
    show_timestamps: bool,
) -> io::Result<()> {
    let width = crossterm::terminal::size()
        .map(|(cols, _)| cols as usize)
        .unwrap_or(80);
    for logged in &shell.log().entries()[*shown..] {
        write!(out, "{}", format_entry(logged, show_timestamps, width))?;
    }
    *shown = shell.log().len();

    let input = shell.input();
    let ghost = if input.cursor_at_end() { input.ghost() } else { None };
    write!(
        out,
        "{}",
        format_input_line(input.text(), ghost.as_deref(), input.cursor_chars())
    )?;
    out.flush()
}
