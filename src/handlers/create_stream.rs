use std::sync::Arc;

use log::debug;

use crate::amf::Amf0Value;
use crate::connection::ConnectionContext;
use crate::handlers::CommandHandler;
use crate::protocol::{RtmpCommand, RtmpHeader, StatusInfo, NS_PLAY_FAILED};
use crate::{Error, Result};

pub struct CreateStreamHandler;

#[async_trait::async_trait]
impl CommandHandler for CreateStreamHandler {
    fn command_name(&self) -> &str {
        "createStream"
    }

    async fn handle(
        &self,
        command: RtmpCommand,
        _header: &RtmpHeader,
        context: Arc<ConnectionContext>,
    ) -> Result<()> {
        let target = context
            .app()
            .await
            .ok_or_else(|| Error::protocol("createStream before connect"))?;

        // Stream objects require read access, regardless of write access
        if !context.config().can_read(&target.app) {
            debug!("createStream denied for app '{}'", target.app);
            let info = StatusInfo::error(NS_PLAY_FAILED, "No read access");
            return context
                .send_command(
                    0,
                    &RtmpCommand::error(command.transaction_id, info.to_amf()),
                )
                .await;
        }

        let stream_id = {
            let mut streams = context.streams().lock().await;
            streams.create_stream()
        };

        context
            .send_command(
                0,
                &RtmpCommand::result(
                    command.transaction_id,
                    Amf0Value::Null,
                    Amf0Value::Number(stream_id as f64),
                ),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{bind_app, test_context, test_context_with_config};
    use crate::server::ServerConfig;

    fn create_stream_command() -> RtmpCommand {
        let mut command = RtmpCommand::new("createStream", 2.0);
        command.command_object = Some(Amf0Value::Null);
        command
    }

    #[tokio::test]
    async fn test_allocates_sequential_ids() {
        let (context, mut rx) = test_context();
        bind_app(&context, "live").await;
        let header = RtmpHeader::command(0, 0, 0);

        for expected in 1..=3u32 {
            CreateStreamHandler
                .handle(create_stream_command(), &header, context.clone())
                .await
                .unwrap();

            let reply = rx.recv().await.unwrap();
            let command = RtmpCommand::decode(&reply.payload).unwrap();
            assert_eq!(command.name, "_result");
            assert_eq!(
                command.argument(0).and_then(|v| v.as_number()),
                Some(expected as f64)
            );
        }
    }

    #[tokio::test]
    async fn test_read_access_denied() {
        let config = ServerConfig {
            read_access: "/live".to_string(),
            write_access: "/live".to_string(),
            ..ServerConfig::default()
        };
        let (context, mut rx) = test_context_with_config(config);
        bind_app(&context, "vod").await;
        let header = RtmpHeader::command(0, 0, 0);

        CreateStreamHandler
            .handle(create_stream_command(), &header, context.clone())
            .await
            .unwrap();

        let reply = rx.recv().await.unwrap();
        let command = RtmpCommand::decode(&reply.payload).unwrap();
        assert_eq!(command.name, "_error");
        assert_eq!(
            command
                .argument(0)
                .and_then(|v| v.get_property("code"))
                .and_then(|v| v.as_string()),
            Some(NS_PLAY_FAILED)
        );
        assert!(context.streams().lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_write_access_alone_is_not_enough() {
        // Write access everywhere, read access restricted: createStream is
        // still refused outside the readable app
        let config = ServerConfig {
            read_access: "/live".to_string(),
            write_access: "/".to_string(),
            ..ServerConfig::default()
        };
        let (context, mut rx) = test_context_with_config(config);
        bind_app(&context, "vod").await;
        let header = RtmpHeader::command(0, 0, 0);

        CreateStreamHandler
            .handle(create_stream_command(), &header, context.clone())
            .await
            .unwrap();

        let reply = rx.recv().await.unwrap();
        let command = RtmpCommand::decode(&reply.payload).unwrap();
        assert_eq!(command.name, "_error");
        assert_eq!(
            command
                .argument(0)
                .and_then(|v| v.get_property("code"))
                .and_then(|v| v.as_string()),
            Some(NS_PLAY_FAILED)
        );
        assert!(context.streams().lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_before_connect_is_fatal() {
        let (context, _rx) = test_context();
        let header = RtmpHeader::command(0, 0, 0);

        let result = CreateStreamHandler
            .handle(create_stream_command(), &header, context)
            .await;
        assert!(result.is_err());
    }
}
