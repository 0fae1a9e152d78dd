//! Session management for pdesk.
//!
//! Owns the three well-known terminal sessions, routes shell output to
//! their widgets, watches it for URLs and drives the sidebar actions that
//! type commands into the shells.

mod actions;
mod assistant;
mod hub;
mod injection;
mod project;
mod router;
mod scripts;
mod tabs;
mod url_watcher;

pub use actions::{ActionContext, ShellFlavor, SidebarAction};
pub use assistant::{AssistantCli, LoginShellProbe};
pub use hub::{Collaborators, Layout, SessionHub};
pub use injection::{CommandInjector, FollowUp, Injection, InjectionError};
pub use project::{DirEntry, LocalProject, ProjectFiles};
pub use router::{exit_message, route, DropReason, Routed};
pub use scripts::{PackageJsonScripts, PackageJsonStatus, ScriptCatalog};
pub use tabs::TabSignal;
pub use url_watcher::{find_urls, UrlAction, UrlKind, UrlNotice, UrlPolicy, UrlWatcher};

#[cfg(test)]
pub(crate) use assistant::MockAssistantCli;
#[cfg(test)]
pub(crate) use project::MockProjectFiles;
#[cfg(test)]
pub(crate) use scripts::MockScriptCatalog;
