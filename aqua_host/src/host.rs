//! The narrow surface plugins see.
//!
//! Plugins never touch the engine directly: they register named commands
//! and receive a capability context when one runs. Discovery, loading and
//! enable/disable live with the embedding application, not here.

use std::collections::HashMap;
use std::path::PathBuf;

use aqua_core::DocumentEvent;
use crossbeam_channel::Receiver;

use crate::notification::{Notification, NotificationQueue, Severity};

/// Opaque identity of a document the host has seen open.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferHandle {
    path: PathBuf,
}

impl BufferHandle {
    /// Display name for UI surfaces: the file name, or the full path when
    /// there is no final component.
    pub fn title(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Full path of the document.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

/// Capabilities handed to a command while it runs.
pub struct HostContext<'a> {
    notifications: &'a mut NotificationQueue,
    documents: &'a [BufferHandle],
}

impl HostContext<'_> {
    /// Shows a notification to the user.
    pub fn show_notification(&mut self, message: &str) {
        self.notifications
            .push(Notification::new(message, Severity::Info));
    }

    /// Writes to the application log.
    pub fn log_message(&self, message: &str) {
        log::info!(target: "plugin", "{message}");
    }

    /// Documents currently open, in open order.
    pub fn documents(&self) -> &[BufferHandle] {
        self.documents
    }
}

type CommandAction = Box<dyn Fn(&mut HostContext<'_>) + Send>;

/// Registry of plugin commands plus the host-side feedback surfaces.
///
/// The host consumes the engine's document-event channel; `pump_events`
/// must run regularly (typically once per frame) to keep the open-document
/// list current.
pub struct PluginHost {
    commands: HashMap<String, CommandAction>,
    notifications: NotificationQueue,
    events: Receiver<DocumentEvent>,
    documents: Vec<BufferHandle>,
}

impl PluginHost {
    /// Creates a host consuming `events` from a text buffer's
    /// `subscribe()`.
    pub fn new(events: Receiver<DocumentEvent>) -> Self {
        Self {
            commands: HashMap::new(),
            notifications: NotificationQueue::new(),
            events,
            documents: Vec::new(),
        }
    }

    /// Registers a named command. Returns false (and keeps the existing
    /// registration) when the name is already taken.
    pub fn register_command(
        &mut self,
        name: impl Into<String>,
        action: impl Fn(&mut HostContext<'_>) + Send + 'static,
    ) -> bool {
        let name = name.into();
        if self.commands.contains_key(&name) {
            log::warn!("command {name:?} is already registered");
            return false;
        }
        self.commands.insert(name, Box::new(action));
        true
    }

    /// Runs a registered command. Returns false for unknown names.
    pub fn run_command(&mut self, name: &str) -> bool {
        let Some(action) = self.commands.get(name) else {
            log::warn!("unknown command {name:?}");
            return false;
        };
        let mut ctx = HostContext {
            notifications: &mut self.notifications,
            documents: &self.documents,
        };
        action(&mut ctx);
        true
    }

    /// Registered command names, unordered.
    pub fn command_names(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    /// Shows a notification to the user.
    pub fn show_notification(&mut self, message: &str) {
        self.notifications
            .push(Notification::new(message, Severity::Info));
    }

    /// Writes to the application log.
    pub fn log_message(&self, message: &str) {
        log::info!(target: "plugin", "{message}");
    }

    /// Drains pending document events, updating the open-document list.
    /// Returns how many events were handled.
    pub fn pump_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            match event {
                DocumentEvent::Opened { path } => {
                    log::debug!("document opened: {}", path.display());
                    self.documents.push(BufferHandle { path });
                }
                DocumentEvent::Closed { path } => {
                    log::debug!("document closed: {}", path.display());
                    self.documents.retain(|d| d.path != path);
                }
            }
            handled += 1;
        }
        handled
    }

    /// Documents currently open, in open order.
    pub fn documents(&self) -> &[BufferHandle] {
        &self.documents
    }

    /// The live notification queue.
    pub fn notifications(&mut self) -> &mut NotificationQueue {
        &mut self.notifications
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn host_with_sender() -> (PluginHost, crossbeam_channel::Sender<DocumentEvent>) {
        let (tx, rx) = unbounded();
        (PluginHost::new(rx), tx)
    }

    #[test]
    fn test_register_and_run_command() {
        let (mut host, _tx) = host_with_sender();

        assert!(host.register_command("hello", |ctx| {
            ctx.show_notification("hi there");
        }));
        assert!(host.run_command("hello"));
        assert_eq!(host.notifications().len(), 1);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let (mut host, _tx) = host_with_sender();

        assert!(host.register_command("x", |_| {}));
        assert!(!host.register_command("x", |_| {}));
        assert_eq!(host.command_names(), vec!["x"]);
    }

    #[test]
    fn test_unknown_command() {
        let (mut host, _tx) = host_with_sender();
        assert!(!host.run_command("nope"));
    }

    #[test]
    fn test_event_pump_tracks_documents() {
        let (mut host, tx) = host_with_sender();
        let path = PathBuf::from("/tmp/notes.txt");

        tx.send(DocumentEvent::Opened { path: path.clone() }).unwrap();
        assert_eq!(host.pump_events(), 1);
        assert_eq!(host.documents().len(), 1);
        assert_eq!(host.documents()[0].title(), "notes.txt");

        tx.send(DocumentEvent::Closed { path }).unwrap();
        host.pump_events();
        assert!(host.documents().is_empty());
    }

    #[test]
    fn test_commands_see_open_documents() {
        let (mut host, tx) = host_with_sender();
        tx.send(DocumentEvent::Opened {
            path: PathBuf::from("/a/b.txt"),
        })
        .unwrap();
        host.pump_events();

        host.register_command("count", |ctx| {
            let n = ctx.documents().len();
            ctx.show_notification(&format!("{n} open"));
            ctx.log_message("counted documents");
        });
        host.run_command("count");

        let first = host.notifications().iter().next().unwrap().message.clone();
        assert_eq!(first, "1 open");
    }
}
