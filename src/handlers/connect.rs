use std::sync::Arc;

use log::{debug, info};

use crate::amf::{Amf0Object, Amf0Value};
use crate::connection::{AppTarget, ConnectionContext};
use crate::handlers::CommandHandler;
use crate::protocol::{
    ConnectArgs, ProtocolControl, RtmpCommand, RtmpHeader, UserControlEvent, LIMIT_TYPE_DYNAMIC,
    NC_CONNECT_REJECTED, NC_CONNECT_SUCCESS,
};
use crate::{Error, Result};

pub struct ConnectHandler;

#[async_trait::async_trait]
impl CommandHandler for ConnectHandler {
    fn command_name(&self) -> &str {
        "connect"
    }

    async fn handle(
        &self,
        command: RtmpCommand,
        _header: &RtmpHeader,
        context: Arc<ConnectionContext>,
    ) -> Result<()> {
        if context.is_connected().await {
            return Err(Error::protocol("Connect received, but already connected"));
        }

        let args = match ConnectArgs::parse(&command) {
            Ok(args) => args,
            Err(e) => {
                debug!("Rejecting connect: {}", e);
                return reject(&context, &command, "Malformed connect arguments").await;
            }
        };

        // An app neither readable nor writable can never do anything useful
        let config = context.config();
        if !config.can_read(&args.app) && !config.can_write(&args.app) {
            debug!("Rejecting connect to app '{}': no access", args.app);
            return reject(&context, &command, "No access to application").await;
        }

        info!(
            "CONNECT {} app={} instance={}",
            context.peer_addr(),
            args.app,
            args.instance
        );

        context
            .set_app(AppTarget {
                app: args.app,
                instance: args.instance,
            })
            .await;
        context.set_object_encoding(args.object_encoding).await;

        // Negotiation sequence: window ack, peer bandwidth, stream begin,
        // chunk size, then the result
        context
            .send_control(ProtocolControl::WindowAckSize(config.window_ack_size))
            .await?;
        context
            .send_control(ProtocolControl::SetPeerBandwidth {
                size: config.peer_bandwidth,
                limit_type: LIMIT_TYPE_DYNAMIC,
            })
            .await?;
        context
            .send_user_control(UserControlEvent::StreamBegin(0))
            .await?;
        context
            .send_control(ProtocolControl::SetChunkSize(config.chunk_size))
            .await?;

        let properties = Amf0Value::Object(
            Amf0Object::new()
                .with("fmsVer", Amf0Value::String("FMS/3,5,5,2004".to_string()))
                .with("capabilities", Amf0Value::Number(31.0))
                .with("mode", Amf0Value::Number(1.0)),
        );
        let information = Amf0Value::Object(
            Amf0Object::new()
                .with("level", Amf0Value::String("status".to_string()))
                .with("code", Amf0Value::String(NC_CONNECT_SUCCESS.to_string()))
                .with(
                    "description",
                    Amf0Value::String("Connection succeeded.".to_string()),
                )
                .with(
                    "objectEncoding",
                    Amf0Value::Number(context.object_encoding().await),
                )
                .with("clientid", Amf0Value::String(context.client_id())),
        );

        context
            .send_command(
                0,
                &RtmpCommand::result(command.transaction_id, properties, information),
            )
            .await
    }
}

async fn reject(
    context: &ConnectionContext,
    command: &RtmpCommand,
    description: &str,
) -> Result<()> {
    let information = Amf0Value::Object(
        Amf0Object::new()
            .with("level", Amf0Value::String("error".to_string()))
            .with("code", Amf0Value::String(NC_CONNECT_REJECTED.to_string()))
            .with("description", Amf0Value::String(description.to_string())),
    );

    context
        .send_command(
            0,
            &RtmpCommand::error(command.transaction_id, information),
        )
        .await?;
    context.request_close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::test_context;
    use crate::protocol::{
        MSG_TYPE_SET_CHUNK_SIZE, MSG_TYPE_SET_PEER_BW, MSG_TYPE_USER_CONTROL, MSG_TYPE_WINDOW_ACK,
    };

    fn connect_command(app: &str) -> RtmpCommand {
        let mut command = RtmpCommand::new("connect", 1.0);
        command.command_object = Some(Amf0Value::Object(
            Amf0Object::new()
                .with("app", Amf0Value::String(app.to_string()))
                .with("objectEncoding", Amf0Value::Number(0.0)),
        ));
        command
    }

    #[tokio::test]
    async fn test_connect_sequence_and_result() {
        let (context, mut rx) = test_context();
        let header = RtmpHeader::command(0, 0, 0);

        ConnectHandler
            .handle(connect_command("live"), &header, context.clone())
            .await
            .unwrap();

        // Exact negotiation order
        assert_eq!(rx.recv().await.unwrap().message_type(), MSG_TYPE_WINDOW_ACK);
        assert_eq!(
            rx.recv().await.unwrap().message_type(),
            MSG_TYPE_SET_PEER_BW
        );
        assert_eq!(
            rx.recv().await.unwrap().message_type(),
            MSG_TYPE_USER_CONTROL
        );
        assert_eq!(
            rx.recv().await.unwrap().message_type(),
            MSG_TYPE_SET_CHUNK_SIZE
        );

        let result = rx.recv().await.unwrap();
        let command = RtmpCommand::decode(&result.payload).unwrap();
        assert_eq!(command.name, "_result");
        assert_eq!(
            command
                .argument(0)
                .and_then(|v| v.get_property("code"))
                .and_then(|v| v.as_string()),
            Some(NC_CONNECT_SUCCESS)
        );
        assert_eq!(
            command
                .argument(0)
                .and_then(|v| v.get_property("objectEncoding"))
                .and_then(|v| v.as_number()),
            Some(0.0)
        );

        assert!(context.is_connected().await);
    }

    #[tokio::test]
    async fn test_double_connect_is_fatal() {
        let (context, _rx) = test_context();
        let header = RtmpHeader::command(0, 0, 0);

        ConnectHandler
            .handle(connect_command("live"), &header, context.clone())
            .await
            .unwrap();

        let result = ConnectHandler
            .handle(connect_command("live"), &header, context)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_missing_app_rejected() {
        let (context, mut rx) = test_context();
        let header = RtmpHeader::command(0, 0, 0);

        let mut command = RtmpCommand::new("connect", 1.0);
        command.command_object = Some(Amf0Value::Object(Amf0Object::new()));

        ConnectHandler
            .handle(command, &header, context.clone())
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
            Some(NC_CONNECT_REJECTED)
        );
        assert!(context.close_requested());
    }
}
