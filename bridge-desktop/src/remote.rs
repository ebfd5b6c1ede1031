//! In-process Remote Command Center

use bridge_traits::{
    CommandRegistration, CommandStatus, RemoteCommand, RemoteCommandCenter, RemoteCommandKind,
};
use parking_lot::RwLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Remote command center living in the host process.
///
/// Media-key listeners, tray menus or tests call [`dispatch`](Self::dispatch);
/// the command is forwarded to the registered handler if it was registered
/// for that command kind.
#[derive(Default)]
pub struct InProcessCommandCenter {
    registration: RwLock<Option<CommandRegistration>>,
}

impl InProcessCommandCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `command` to the registered handler.
    ///
    /// Returns `NoSuchContent` when nothing is registered and `Failed` when
    /// the command kind was not enabled by the registration.
    pub async fn dispatch(&self, command: RemoteCommand) -> CommandStatus {
        let handler = {
            let guard = self.registration.read();
            let Some(registration) = guard.as_ref() else {
                debug!(?command, "No handler registered");
                return CommandStatus::NoSuchContent;
            };
            if !registration.commands.contains(&command.kind()) {
                warn!(?command, "Command not enabled");
                return CommandStatus::Failed;
            }
            registration.handler.clone()
        };

        handler.handle(command).await
    }

    pub fn is_bound(&self) -> bool {
        self.registration.read().is_some()
    }

    /// Commands currently enabled, empty when unbound.
    pub fn enabled_commands(&self) -> Vec<RemoteCommandKind> {
        self.registration
            .read()
            .as_ref()
            .map(|r| r.commands.clone())
            .unwrap_or_default()
    }

    /// Skip interval advertised by the current registration.
    pub fn skip_interval(&self) -> Option<Duration> {
        self.registration.read().as_ref().map(|r| r.skip_interval)
    }
}

impl RemoteCommandCenter for InProcessCommandCenter {
    fn register(&self, registration: CommandRegistration) {
        info!(
            commands = registration.commands.len(),
            skip_secs = registration.skip_interval.as_secs_f64(),
            "Remote commands registered"
        );
        *self.registration.write() = Some(registration);
    }

    fn unregister_all(&self) {
        if self.registration.write().take().is_some() {
            info!("Remote commands unregistered");
        }
    }
}
