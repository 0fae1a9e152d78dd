//! Line-based driver for the session hub.
//!
//! Lines starting with `:` are commands; anything else is typed into the
//! active session followed by Enter. Output of the active session is
//! mirrored to the console writer.

use anyhow::{Context as _, Result};
use pdesk_workspace::{exit_message, InjectionError, Routed, SessionHub, SidebarAction};
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use terminal::SessionId;
use terminal_view::SessionMode;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _};
use tokio::task::JoinHandle;

const HELP: &str = "\
:tab <main|doctor|exec>  switch the active session
:run <script>            npm run <script> in exec
:exec <file>             build a prompt file with the assistant (main)
:edit <file>             revise a prompt file's code (doctor)
:fix <script>            repair an npm script (doctor)
:sync                    install project dependencies (exec)
:restart [session]       restart a session
:kill [session]          stop a session's shell
:clear                   clear the active screen
:select / :input         selection mode on / off
:copy / :paste           clipboard for the active session
:cd <dir>                move every session to another folder
:scripts                 list npm scripts
:delete <script>         remove an npm script
:screen                  print the active screen
:quit                    exit
::text                   send text starting with ':'";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Tab(SessionId),
    Action(SidebarAction),
    Restart(Option<SessionId>),
    Kill(Option<SessionId>),
    Clear,
    Select,
    Input,
    Copy,
    Paste,
    ChangeDirectory(PathBuf),
    Scripts,
    DeleteScript(String),
    Screen,
    Help,
    Quit,
    /// Text typed into the active session.
    Send(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command :{0} (try :help)")]
    Unknown(String),
    #[error(":{command} needs {what}")]
    MissingArgument {
        command: &'static str,
        what: &'static str,
    },
}

impl FromStr for ConsoleCommand {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let Some(rest) = line.strip_prefix(':') else {
            return Ok(ConsoleCommand::Send(line.to_string()));
        };
        if rest.starts_with(':') {
            return Ok(ConsoleCommand::Send(rest.to_string()));
        }

        let (name, arg) = match rest.trim().split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|arg| !arg.is_empty())),
            None => (rest.trim(), None),
        };
        let session = |arg: Option<&str>| arg.and_then(|arg| arg.parse::<SessionId>().ok());
        let required = |command: &'static str, what: &'static str| {
            arg.map(str::to_string)
                .ok_or(ParseError::MissingArgument { command, what })
        };

        let command = match name {
            "tab" => ConsoleCommand::Tab(session(arg).ok_or(ParseError::MissingArgument {
                command: "tab",
                what: "a session name",
            })?),
            "run" => ConsoleCommand::Action(SidebarAction::RunScript {
                script: required("run", "a script name")?,
            }),
            "exec" => ConsoleCommand::Action(SidebarAction::ExecuteFile {
                file: required("exec", "a file")?.into(),
            }),
            "edit" => ConsoleCommand::Action(SidebarAction::EditFile {
                file: required("edit", "a file")?.into(),
            }),
            "fix" => ConsoleCommand::Action(SidebarAction::FixScript {
                script: required("fix", "a script name")?,
            }),
            "sync" => ConsoleCommand::Action(SidebarAction::Sync),
            "restart" => ConsoleCommand::Restart(session(arg)),
            "kill" => ConsoleCommand::Kill(session(arg)),
            "clear" => ConsoleCommand::Clear,
            "select" => ConsoleCommand::Select,
            "input" => ConsoleCommand::Input,
            "copy" => ConsoleCommand::Copy,
            "paste" => ConsoleCommand::Paste,
            "cd" => ConsoleCommand::ChangeDirectory(required("cd", "a directory")?.into()),
            "scripts" => ConsoleCommand::Scripts,
            "delete" => ConsoleCommand::DeleteScript(required("delete", "a script name")?),
            "screen" => ConsoleCommand::Screen,
            "help" | "h" | "?" => ConsoleCommand::Help,
            "quit" | "q" | "exit" => ConsoleCommand::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Console<W: Write> {
    hub: SessionHub,
    out: W,
    pending: Vec<JoinHandle<Result<(), InjectionError>>>,
}

impl<W: Write> Console<W> {
    pub fn new(hub: SessionHub, out: W) -> Self {
        Self {
            hub,
            out,
            pending: Vec::new(),
        }
    }

    pub fn into_hub(self) -> SessionHub {
        self.hub
    }

    /// Read commands from `input` until `:quit` or end of input.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, input: R) -> Result<()> {
        let mut lines = input.lines();
        writeln!(self.out, "pdesk ready, :help for commands")?;
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line.context("Failed to read console input")? else {
                        break;
                    };
                    if self.handle_line(&line).await? == Flow::Quit {
                        break;
                    }
                }
                routed = self.hub.next_event() => {
                    let Some(routed) = routed else { break };
                    self.show(&routed)?;
                }
            }
            self.reap().await?;
        }
        Ok(())
    }

    pub async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        match line.parse::<ConsoleCommand>() {
            Ok(command) => self.apply(command).await,
            Err(e) => {
                writeln!(self.out, "{e}")?;
                Ok(Flow::Continue)
            }
        }
    }

    fn active(&self) -> SessionId {
        self.hub.active().cloned().unwrap_or(SessionId::Main)
    }

    pub async fn apply(&mut self, command: ConsoleCommand) -> Result<Flow> {
        let active = self.active();
        match command {
            ConsoleCommand::Tab(id) => {
                if self.hub.focus(&id) {
                    let screen = self.hub.screen_text(&id).unwrap_or_default();
                    writeln!(self.out, "-- {id} --\r\n{screen}")?;
                } else {
                    writeln!(self.out, "no session {id}")?;
                }
            }
            ConsoleCommand::Action(action) => {
                let action = self.resolve_files(action);
                match self.hub.run_action(&action) {
                    Ok(task) => self.pending.push(task),
                    Err(e) => writeln!(self.out, "{action:?} failed: {e:#}")?,
                }
            }
            ConsoleCommand::Restart(id) => {
                let id = id.unwrap_or(active);
                if !self.hub.restart(&id).await {
                    writeln!(self.out, "could not restart {id}")?;
                }
            }
            ConsoleCommand::Kill(id) => self.hub.kill(&id.unwrap_or(active)),
            ConsoleCommand::Clear => {
                self.hub.clear(&active);
            }
            ConsoleCommand::Select => {
                self.hub.set_mode(&active, SessionMode::Selection);
                writeln!(self.out, "selection mode, input to {active} is paused")?;
            }
            ConsoleCommand::Input => {
                self.hub.set_mode(&active, SessionMode::Input);
            }
            ConsoleCommand::Copy => {
                self.hub.select_all(&active);
                if !self.hub.copy_selection(&active) {
                    writeln!(self.out, "nothing to copy")?;
                }
            }
            ConsoleCommand::Paste => {
                if !self.hub.paste(&active) {
                    writeln!(self.out, "nothing pasted")?;
                }
            }
            ConsoleCommand::ChangeDirectory(dir) => {
                if let Err(e) = self.hub.change_directory(&dir) {
                    writeln!(self.out, "cd failed: {e:#}")?;
                }
            }
            ConsoleCommand::Scripts => match self.hub.list_scripts() {
                Ok(scripts) if scripts.is_empty() => writeln!(self.out, "no scripts")?,
                Ok(scripts) => {
                    for (name, command) in &scripts {
                        writeln!(self.out, "{name}: {command}")?;
                    }
                }
                Err(e) => writeln!(self.out, "reading scripts failed: {e:#}")?,
            },
            ConsoleCommand::DeleteScript(name) => {
                if let Err(e) = self.hub.delete_script(&name) {
                    writeln!(self.out, "{e:#}")?;
                }
            }
            ConsoleCommand::Screen => {
                let screen = self.hub.screen_text(&active).unwrap_or_default();
                writeln!(self.out, "{screen}")?;
            }
            ConsoleCommand::Help => writeln!(self.out, "{HELP}")?,
            ConsoleCommand::Quit => return Ok(Flow::Quit),
            ConsoleCommand::Send(text) => {
                if !self.hub.write(&active, format!("{text}\r").as_bytes()) {
                    writeln!(self.out, "input ignored, :input to resume typing")?;
                }
            }
        }
        self.out.flush()?;
        Ok(Flow::Continue)
    }

    /// Relative file arguments are taken from the project folder.
    fn resolve_files(&self, action: SidebarAction) -> SidebarAction {
        let resolve = |file: PathBuf| {
            if file.is_absolute() {
                file
            } else {
                self.hub.working_dir().join(file)
            }
        };
        match action {
            SidebarAction::ExecuteFile { file } => SidebarAction::ExecuteFile {
                file: resolve(file),
            },
            SidebarAction::EditFile { file } => SidebarAction::EditFile {
                file: resolve(file),
            },
            other => other,
        }
    }

    /// Mirror the active session.
    pub fn show(&mut self, routed: &Routed) -> Result<()> {
        let active = self.hub.active();
        match routed {
            Routed::Output { id, bytes, urls } if active == Some(id) => {
                self.out.write_all(bytes)?;
                for line in urls.iter().filter_map(|url| url.status_line()) {
                    self.out.write_all(line.as_bytes())?;
                }
            }
            Routed::Exited { id, status } if active == Some(id) => {
                self.out.write_all(exit_message(id, status).as_bytes())?;
            }
            _ => return Ok(()),
        }
        self.out.flush()?;
        Ok(())
    }

    /// Report injections that have finished.
    async fn reap(&mut self) -> Result<()> {
        let (finished, running): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|task| task.is_finished());
        self.pending = running;
        for task in finished {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => writeln!(self.out, "{e}, install it and try again")?,
                Err(e) => tracing::warn!("Injection task failed: {}", e),
            }
        }
        Ok(())
    }

    #[cfg(test)]
    fn output(&self) -> &W {
        &self.out
    }
}
