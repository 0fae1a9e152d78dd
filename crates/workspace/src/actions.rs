//! Sidebar actions that drive the terminals.
//!
//! Each action picks a target session, writes an instruction file for the
//! assistant where needed, and produces the [`Injection`] that runs it.

use crate::{Injection, ProjectFiles, ScriptCatalog};
use anyhow::Result;
use settings::constants::assistant;
use std::path::{Path, PathBuf};
use std::time::Duration;
use terminal::SessionId;

const CODE_RULES: &str = "\
## Implementation details

- Write any code in TypeScript
- Code must run on Node 18 or later
- Put the logic in a single main() function and call it immediately
- Install any dependencies you need
- When the program starts, open its port with the `open` module

## Acceptance criteria

- [ ] File existence and format checks
- [ ] Summary log output
- [ ] Safe shutdown on SIGINT
- [ ] Error message and exit code on failure";

const SYNC_INSTRUCTION: &str = "Read the projects in the code folder, then install every dependency they need. Do nothing else.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidebarAction {
    /// Build the code a prompt file describes (main session).
    ExecuteFile { file: PathBuf },
    /// Revise the code built from a prompt file (doctor session).
    EditFile { file: PathBuf },
    /// Repair an npm script and its code (doctor session).
    FixScript { script: String },
    /// `npm run <script>` (exec session).
    RunScript { script: String },
    /// Install the project's dependencies (exec session).
    Sync,
}

/// How the target shell expects arguments to be quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellFlavor {
    Posix,
    PowerShell,
}

impl ShellFlavor {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            ShellFlavor::PowerShell
        } else {
            ShellFlavor::Posix
        }
    }

    pub fn quote(self, arg: &str) -> String {
        match self {
            ShellFlavor::Posix => format!("'{}'", arg.replace('\'', r"'\''")),
            ShellFlavor::PowerShell => format!("\"{}\"", arg.replace('"', "`\"")),
        }
    }

    /// `program` followed by the quoted `args`. PowerShell first switches
    /// the console to UTF-8 so non-ASCII paths survive.
    pub fn command_line(self, program: &str, args: &[&Path]) -> String {
        let mut line = match self {
            ShellFlavor::Posix => String::new(),
            ShellFlavor::PowerShell => "chcp 65001 >$null; ".to_string(),
        };
        line.push_str(program);
        for arg in args {
            line.push(' ');
            line.push_str(&self.quote(&arg.to_string_lossy()));
        }
        line
    }
}

/// What an action needs to know about its surroundings.
pub struct ActionContext<'a> {
    pub project_root: &'a Path,
    /// Assistant CLI with its leading arguments, e.g. `claude --permission-mode ...`.
    pub assistant: &'a str,
    pub flavor: ShellFlavor,
    pub sync_follow_up: Duration,
    pub files: &'a dyn ProjectFiles,
    pub scripts: &'a dyn ScriptCatalog,
}

impl SidebarAction {
    pub fn target(&self) -> SessionId {
        match self {
            SidebarAction::ExecuteFile { .. } => SessionId::Main,
            SidebarAction::EditFile { .. } | SidebarAction::FixScript { .. } => SessionId::Doctor,
            SidebarAction::RunScript { .. } | SidebarAction::Sync => SessionId::Exec,
        }
    }

    /// Write the instruction file (if any) and build the injection.
    pub fn prepare(&self, cx: &ActionContext<'_>) -> Result<Injection> {
        let root = cx.project_root;
        let target = self.target();

        let injection = match self {
            SidebarAction::RunScript { script } => {
                return Ok(Injection::new(target, format!("npm run {script}")));
            }
            SidebarAction::ExecuteFile { file } => {
                let (name, folder) = file_names(file);
                let instruction = write_instruction(
                    cx,
                    assistant::INSTRUCTION_FILE,
                    &format!(
                        "Read {name} and build the code its prompt describes. The project root is {}. \
                         Put the code in a {folder} folder inside the code folder at the root. \
                         When the code is done, add a script named {folder} to package.json that runs it.\n\n\
                         Also apply the following to the prompt:\n\n{CODE_RULES}",
                        root.display()
                    ),
                )?;
                let command = cx
                    .flavor
                    .command_line(cx.assistant, &[instruction.as_path(), file.as_path()]);
                Injection::new(target, command)
            }
            SidebarAction::EditFile { file } => {
                let (name, folder) = file_names(file);
                let instruction = write_instruction(
                    cx,
                    assistant::EDIT_INSTRUCTION_FILE,
                    &format!(
                        "The prompt in {name} has changes. The project root is {}. \
                         Also check the code in the {folder} folder inside the code folder.",
                        root.display()
                    ),
                )?;
                let command = cx
                    .flavor
                    .command_line(cx.assistant, &[instruction.as_path(), file.as_path()]);
                Injection::new(target, command)
            }
            SidebarAction::FixScript { script } => {
                let instruction = write_instruction(
                    cx,
                    assistant::FIX_INSTRUCTION_FILE,
                    &format!(
                        "The {script} script and its code need changes. The project root is {}. \
                         Run the {script} script first, and if the code in the {script} folder \
                         inside the code folder misbehaves, fix it.",
                        root.display()
                    ),
                )?;
                let command = cx.flavor.command_line(cx.assistant, &[instruction.as_path()]);
                Injection::new(target, command)
            }
            SidebarAction::Sync => {
                let status = cx.scripts.ensure_package_json()?;
                tracing::info!(?status, "Checked package.json before sync");
                let instruction =
                    write_instruction(cx, assistant::SYNC_INSTRUCTION_FILE, SYNC_INSTRUCTION)?;
                let command = cx.flavor.command_line(cx.assistant, &[instruction.as_path()]);
                Injection::new(target, command).with_follow_up(
                    cx.sync_follow_up,
                    vec!["\r\n".to_string(), "npm install\r".to_string()],
                )
            }
        };
        Ok(injection.requiring_assistant())
    }
}

/// File name and the same name without its extension.
fn file_names(file: &Path) -> (String, String) {
    let name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.clone());
    (name, stem)
}

fn write_instruction(cx: &ActionContext<'_>, file_name: &str, content: &str) -> Result<PathBuf> {
    let path = cx.project_root.join(file_name);
    cx.files.write_file(&path, content)?;
    tracing::debug!(path = %path.display(), "Wrote assistant instruction");
    Ok(path)
}
