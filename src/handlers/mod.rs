mod call;
mod close_stream;
mod connect;
mod create_stream;
mod delete_stream;
mod pause;
mod play;
mod publish;
mod receive;
mod seek;

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::connection::ConnectionContext;
use crate::protocol::{RtmpCommand, RtmpHeader};
use crate::Result;

use call::{CallHandler, CloseHandler};
use close_stream::CloseStreamHandler;
use connect::ConnectHandler;
use create_stream::CreateStreamHandler;
use delete_stream::DeleteStreamHandler;
use pause::PauseHandler;
use play::PlayHandler;
use publish::PublishHandler;
use receive::{ReceiveAudioHandler, ReceiveVideoHandler};
use seek::SeekHandler;

#[async_trait::async_trait]
pub trait CommandHandler: Send + Sync {
    /// Command name this handler processes
    fn command_name(&self) -> &str;

    /// Handle the command. Command-logical failures are answered with
    /// `_error`/`onStatus` frames and return Ok; an Err tears the
    /// connection down.
    async fn handle(
        &self,
        command: RtmpCommand,
        header: &RtmpHeader,
        context: Arc<ConnectionContext>,
    ) -> Result<()>;
}

/// Command handler registry, shared across connections
pub struct CommandHandlerRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandHandlerRegistry {
    /// Create a registry with the full NetConnection/NetStream command set
    pub fn new() -> Self {
        let mut registry = CommandHandlerRegistry {
            handlers: HashMap::new(),
        };

        registry.register(Arc::new(ConnectHandler));
        registry.register(Arc::new(CallHandler));
        registry.register(Arc::new(CloseHandler));
        registry.register(Arc::new(CreateStreamHandler));
        registry.register(Arc::new(DeleteStreamHandler));
        registry.register(Arc::new(CloseStreamHandler));
        registry.register(Arc::new(PublishHandler));
        registry.register(Arc::new(PlayHandler));
        registry.register(Arc::new(PauseHandler));
        registry.register(Arc::new(SeekHandler));
        registry.register(Arc::new(ReceiveAudioHandler));
        registry.register(Arc::new(ReceiveVideoHandler));

        registry
    }

    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        self.handlers
            .insert(handler.command_name().to_string(), handler);
    }

    /// Route a decoded command; unknown commands are ignored
    pub async fn handle(
        &self,
        command: RtmpCommand,
        header: &RtmpHeader,
        context: Arc<ConnectionContext>,
    ) -> Result<()> {
        match self.handlers.get(&command.name) {
            Some(handler) => handler.handle(command, header, context).await,
            None => {
                debug!("Unrecognized command: {}", command.name);
                Ok(())
            }
        }
    }
}

impl Default for CommandHandlerRegistry {
    fn default() -> Self {
        CommandHandlerRegistry::new()
    }
}
