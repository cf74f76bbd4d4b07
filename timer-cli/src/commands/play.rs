//! Interactive game loop.
//!
//! Reads one command per line from stdin. The session store is an in-process
//! [`MemoryStore`], so hosting always connects and joining an unknown code
//! falls back to local play.

use anyhow::{anyhow, bail, Context, Result};
use bgtimer_client::{ClientConfig, MemoryStore, SessionClient};
use bgtimer_types::{ParticipantId, TimerMode};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use super::view::{render_client, render_history};

const FOLLOWING: &str = "the host controls this game";

const HELP: &str = "\
Commands:
  start <id>           give the turn to a participant
  pause | resume       stop or restart the clock
  next                 pass the turn on
  reset                clear the turn and reset clocks
  add [name]           add a participant
  remove <id>          remove a participant
  rename <id> <name>   rename a participant
  mode <up|down>       set count-up or count-down
  initial <seconds>    set the count-down allowance
  title <text>         set the game title
  status               show the session
  save | history       save the game, list saved games
  share                show the invite text
  new | join <code>    host a new session or join one
  leave | quit";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Give the turn to a participant.
    Start(ParticipantId),
    /// Stop the clock.
    Pause,
    /// Restart the clock.
    Resume,
    /// Pass the turn on.
    Next,
    /// Reset clocks.
    Reset,
    /// Add a participant.
    Add(Option<String>),
    /// Remove a participant.
    Remove(ParticipantId),
    /// Rename a participant.
    Rename(ParticipantId, String),
    /// Change the clock direction.
    Mode(TimerMode),
    /// Change the count-down allowance.
    Initial(u64),
    /// Change the title.
    Title(String),
    /// Show the session.
    Status,
    /// Save the game.
    Save,
    /// List saved games.
    History,
    /// Show invite text.
    Share,
    /// Host a new session.
    New,
    /// Join a session.
    Join(String),
    /// Leave the session.
    Leave,
    /// Show help.
    Help,
    /// Exit.
    Quit,
}

impl Command {
    /// Parse a line. `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "start" => Command::Start(participant_id(rest)?),
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "next" => Command::Next,
            "reset" => Command::Reset,
            "add" => Command::Add((!rest.is_empty()).then(|| rest.to_string())),
            "remove" => Command::Remove(participant_id(rest)?),
            "rename" => {
                let (id, name) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| anyhow!("usage: rename <id> <name>"))?;
                Command::Rename(participant_id(id)?, name.trim().to_string())
            }
            "mode" => Command::Mode(rest.parse()?),
            "initial" => Command::Initial(
                rest.parse()
                    .with_context(|| format!("invalid seconds: {:?}", rest))?,
            ),
            "title" => Command::Title(rest.to_string()),
            "status" => Command::Status,
            "save" => Command::Save,
            "history" => Command::History,
            "share" => Command::Share,
            "new" => Command::New,
            "join" => {
                if rest.is_empty() {
                    bail!("usage: join <code>");
                }
                Command::Join(rest.to_string())
            }
            "leave" => Command::Leave,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => bail!("unknown command: {} (try 'help')", other),
        };
        Ok(Some(command))
    }

    /// Whether the command needs host authority in a connected session.
    pub fn changes_gameplay(&self) -> bool {
        matches!(
            self,
            Command::Start(_)
                | Command::Pause
                | Command::Resume
                | Command::Next
                | Command::Reset
                | Command::Add(_)
                | Command::Remove(_)
                | Command::Mode(_)
                | Command::Initial(_)
                | Command::Title(_)
        )
    }
}

fn participant_id(input: &str) -> Result<ParticipantId> {
    input
        .trim()
        .parse::<u32>()
        .map(ParticipantId::new)
        .with_context(|| format!("invalid participant id: {:?}", input))
}

/// Run the play command.
pub async fn run(config: ClientConfig, join: Option<&str>, offline: bool) -> Result<()> {
    let port = (!offline).then(MemoryStore::new);
    let client = SessionClient::new(config, port);

    match join {
        Some(code) => {
            if client.join_session(code).await.is_none() {
                bail!("invalid session code: {:?}", code);
            }
        }
        None => {
            client.create_session().await;
        }
    }
    print!("{}", render_client(&client).await);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("error: {:#}", e);
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        debug!("Executing {:?}", command);
        execute(&client, command).await;
    }

    client.leave_session().await;
    Ok(())
}

async fn execute(client: &SessionClient<MemoryStore>, command: Command) {
    if client.follows_host().await && command.changes_gameplay() {
        report(false, FOLLOWING);
        return;
    }
    match command {
        Command::Start(id) => report(client.start(id).await, "no such participant"),
        Command::Pause => report(client.pause().await, "not running"),
        Command::Resume => report(client.resume().await, "nobody holds the turn"),
        Command::Next => report(client.advance_to_next().await, "no participants"),
        Command::Reset => report(client.reset().await, FOLLOWING),
        Command::Add(name) => match client.add_participant(name.as_deref()).await {
            Some(id) => println!("added participant {}", id),
            None => report(false, "cannot add a participant"),
        },
        Command::Remove(id) => report(
            client.remove_participant(id).await,
            "cannot remove (unknown id, or only two participants left)",
        ),
        Command::Rename(id, name) => {
            report(client.rename_participant(id, &name).await, "no such participant")
        }
        Command::Mode(mode) => report(client.set_mode(mode).await, FOLLOWING),
        Command::Initial(seconds) => report(client.set_initial_seconds(seconds).await, FOLLOWING),
        Command::Title(title) => report(client.set_title(&title).await, FOLLOWING),
        Command::Status => print!("{}", render_client(client).await),
        Command::Save => match client.save_game().await {
            Some(record) => println!("saved \"{}\"", record.name),
            None => println!("nothing to save: the game has not started"),
        },
        Command::History => print!("{}", render_history(&client.recent_games(3).await)),
        Command::Share => match client.share_text().await {
            Some(text) => println!("{}", text),
            None => println!("not in a session"),
        },
        Command::New => {
            let code = client.create_session().await;
            println!("hosting session {}", code);
        }
        Command::Join(code) => match client.join_session(&code).await {
            Some(code) => println!("joined session {} ({})", code, client.status().await),
            None => println!("invalid session code"),
        },
        Command::Leave => {
            client.leave_session().await;
            println!("left session");
        }
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
}

fn report(applied: bool, rejected: &str) {
    if !applied {
        println!("ignored: {}", rejected);
    }
}
