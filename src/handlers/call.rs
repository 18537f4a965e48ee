use std::sync::Arc;

use log::debug;

use crate::amf::Amf0Value;
use crate::connection::ConnectionContext;
use crate::handlers::CommandHandler;
use crate::protocol::{RtmpCommand, RtmpHeader};
use crate::Result;

/// `call` invokes a server-side method; no methods are exposed, so known
/// callers get an empty `_result` and fire-and-forget calls are dropped
pub struct CallHandler;

#[async_trait::async_trait]
impl CommandHandler for CallHandler {
    fn command_name(&self) -> &str {
        "call"
    }

    async fn handle(
        &self,
        command: RtmpCommand,
        _header: &RtmpHeader,
        context: Arc<ConnectionContext>,
    ) -> Result<()> {
        // Transaction id 0 means the caller expects no response
        if command.transaction_id == 0.0 {
            debug!("Dropping fire-and-forget call");
            return Ok(());
        }

        context
            .send_command(
                0,
                &RtmpCommand::result(command.transaction_id, Amf0Value::Null, Amf0Value::Null),
            )
            .await
    }
}

/// `close` asks the server to drop the NetConnection
pub struct CloseHandler;

#[async_trait::async_trait]
impl CommandHandler for CloseHandler {
    fn command_name(&self) -> &str {
        "close"
    }

    async fn handle(
        &self,
        _command: RtmpCommand,
        _header: &RtmpHeader,
        context: Arc<ConnectionContext>,
    ) -> Result<()> {
        debug!("Close requested by {}", context.peer_addr());
        context.request_close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::test_context;

    #[tokio::test]
    async fn test_call_answers_with_null_result() {
        let (context, mut rx) = test_context();
        let mut command = RtmpCommand::new("call", 3.0);
        command.command_object = Some(Amf0Value::Null);

        CallHandler
            .handle(command, &RtmpHeader::command(0, 0, 0), context)
            .await
            .unwrap();

        let reply = rx.recv().await.unwrap();
        let decoded = RtmpCommand::decode(&reply.payload).unwrap();
        assert_eq!(decoded.name, "_result");
        assert_eq!(decoded.transaction_id, 3.0);
    }

    #[tokio::test]
    async fn test_close_sets_flag() {
        let (context, _rx) = test_context();

        CloseHandler
            .handle(
                RtmpCommand::new("close", 0.0),
                &RtmpHeader::command(0, 0, 0),
                context.clone(),
            )
            .await
            .unwrap();

        assert!(context.close_requested());
    }
}
