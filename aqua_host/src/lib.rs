//! AquaEdit plugin host - the contract between the engine and plugins.
//!
//! Plugins see an opaque buffer handle and a narrow capability surface:
//! command registration, notifications and logging. Plugin discovery and
//! lifecycle management belong to the embedding application.

pub mod host;
pub mod notification;

pub use host::{BufferHandle, HostContext, PluginHost};
pub use notification::{Notification, NotificationQueue, Severity};
