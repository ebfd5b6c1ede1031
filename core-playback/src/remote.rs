//! # Remote Command Router
//!
//! Translates commands from the host transport (media keys, lock screen,
//! headset buttons) into controller calls.
//!
//! The router only holds a weak reference to the controller: a transport
//! that outlives the playback session gets `NoSuchContent` instead of
//! keeping the session alive.

use crate::config::PlaybackConfig;
use crate::controller::PlaybackController;
use crate::error::{PlaybackError, Result};
use crate::traits::EngineState;
use async_trait::async_trait;
use bridge_traits::{
    CommandRegistration, CommandStatus, RemoteCommand, RemoteCommandCenter, RemoteCommandHandler,
    RemoteCommandKind,
};
use core_runtime::events::{CoreEvent, EventBus, RemoteEvent};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub struct RemoteCommandRouter {
    controller: Weak<PlaybackController>,
    config: PlaybackConfig,
    events: Option<EventBus>,
}

impl RemoteCommandRouter {
    pub fn new(controller: &Arc<PlaybackController>, config: &PlaybackConfig) -> Self {
        Self {
            controller: Arc::downgrade(controller),
            config: config.clone(),
            events: None,
        }
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Interval used by the skip commands.
    pub fn skip_interval(&self) -> Duration {
        self.config.skip_interval
    }

    /// Registers the router with `center` for every supported command.
    pub fn bind(self: &Arc<Self>, center: &dyn RemoteCommandCenter) {
        let commands = RemoteCommandKind::ALL.to_vec();
        info!(
            commands = commands.len(),
            skip_secs = self.skip_interval().as_secs_f64(),
            "Binding remote commands"
        );
        let count = commands.len();
        let handler: Arc<dyn RemoteCommandHandler> = self.clone();
        center.register(CommandRegistration {
            handler,
            commands,
            skip_interval: self.skip_interval(),
        });
        self.emit(RemoteEvent::Bound {
            commands: count,
            skip_interval_ms: self.skip_interval().as_millis() as u64,
        });
    }

    pub fn unbind(&self, center: &dyn RemoteCommandCenter) {
        info!("Unbinding remote commands");
        center.unregister_all();
        self.emit(RemoteEvent::Unbound);
    }

    async fn dispatch(&self, controller: &PlaybackController, command: RemoteCommand) -> Result<()> {
        match command {
            RemoteCommand::Play => controller.resume().await,
            RemoteCommand::Pause => controller.pause().await,
            RemoteCommand::Stop => controller.stop().await,
            RemoteCommand::TogglePlayPause => {
                if controller.state() == EngineState::Playing {
                    controller.pause().await
                } else {
                    controller.resume().await
                }
            }
            RemoteCommand::SkipBackward => {
                controller.rewind(self.skip_interval()).await.map(|_| ())
            }
            RemoteCommand::SkipForward => {
                controller.forward(self.skip_interval()).await.map(|_| ())
            }
            RemoteCommand::ChangePlaybackPosition { position_seconds } => {
                let position = self
                    .config
                    .position_from_seconds(position_seconds)
                    .ok_or(PlaybackError::InvalidPosition(position_seconds))?;
                controller.seek(position).await.map(|_| ())
            }
        }
    }

    fn emit(&self, event: RemoteEvent) {
        if let Some(bus) = &self.events {
            let _ = bus.emit(CoreEvent::Remote(event));
        }
    }
}

#[async_trait]
impl RemoteCommandHandler for RemoteCommandRouter {
    #[instrument(skip(self))]
    async fn handle(&self, command: RemoteCommand) -> CommandStatus {
        let status = match self.controller.upgrade() {
            None => {
                debug!("Controller gone");
                CommandStatus::NoSuchContent
            }
            Some(controller) => match self.dispatch(&controller, command).await {
                Ok(()) => CommandStatus::Success,
                Err(err) => {
                    warn!(error = %err, "Remote command failed");
                    CommandStatus::Failed
                }
            },
        };

        debug!(?status, "Remote command handled");
        self.emit(RemoteEvent::Dispatched { command, status });
        status
    }
}
