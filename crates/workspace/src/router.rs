//! Delivery of process events to session widgets.

use crate::{UrlNotice, UrlWatcher};
use terminal::{ExitStatus, ProcessGeneration, PtyEvent, SessionId};
use terminal_view::SessionMultiplexer;

/// What happened to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    Output {
        id: SessionId,
        bytes: Vec<u8>,
        urls: Vec<UrlNotice>,
    },
    Exited {
        id: SessionId,
        status: ExitStatus,
    },
    Dropped {
        id: SessionId,
        reason: DropReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No widget is bound to the session.
    Unbound,
    /// The widget shows a newer (or no) process.
    Stale {
        event: ProcessGeneration,
        bound: Option<ProcessGeneration>,
    },
}

/// Red line shown when a session's shell exits.
pub fn exit_message(id: &SessionId, status: &ExitStatus) -> String {
    format!(
        "\r\n\x1b[31m{}terminal exited ({status})\x1b[0m\r\n",
        id.label()
    )
}

/// Route one event into the multiplexer's widgets.
///
/// Output goes to the widget bound to the event's session and is then shown
/// to the URL watcher. Anything without a matching widget and generation is
/// dropped; nothing is buffered.
pub fn route(event: PtyEvent, mux: &mut SessionMultiplexer, watcher: &mut UrlWatcher) -> Routed {
    let id = event.session().clone();
    let generation = event.generation();

    if !mux.is_initialized(&id) {
        tracing::warn!(session = %id, %generation, "Dropping event, no widget bound");
        return Routed::Dropped {
            id,
            reason: DropReason::Unbound,
        };
    }
    let bound = mux.bound_generation(&id);
    if bound != Some(generation) {
        tracing::warn!(
            session = %id,
            %generation,
            bound = ?bound,
            "Dropping event from stale process"
        );
        return Routed::Dropped {
            id,
            reason: DropReason::Stale {
                event: generation,
                bound,
            },
        };
    }

    match event {
        PtyEvent::Output { bytes, .. } => {
            tracing::trace!(session = %id, bytes = bytes.len(), "Routing output");
            mux.write_display(&id, &bytes);
            let urls = watcher.observe(&id, &bytes);
            for line in urls.iter().filter_map(UrlNotice::status_line) {
                mux.write_display(&id, line.as_bytes());
            }
            Routed::Output { id, bytes, urls }
        }
        PtyEvent::Exit { status, .. } => {
            tracing::info!(session = %id, %status, "Shell exited");
            watcher.reset(&id);
            mux.mark_exited(&id);
            mux.write_display(&id, exit_message(&id, &status).as_bytes());
            Routed::Exited { id, status }
        }
    }
}
