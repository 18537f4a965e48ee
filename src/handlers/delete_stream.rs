use std::sync::Arc;

use log::debug;

use crate::connection::ConnectionContext;
use crate::handlers::CommandHandler;
use crate::protocol::{RtmpCommand, RtmpHeader, StatusInfo, NS_RECORD_STOP};
use crate::Result;

pub struct DeleteStreamHandler;

#[async_trait::async_trait]
impl CommandHandler for DeleteStreamHandler {
    fn command_name(&self) -> &str {
        "deleteStream"
    }

    async fn handle(
        &self,
        command: RtmpCommand,
        header: &RtmpHeader,
        context: Arc<ConnectionContext>,
    ) -> Result<()> {
        // The target stream id is the first argument, not the carrying
        // message stream
        let Some(stream_id) = command.argument(0).and_then(|v| v.as_number()) else {
            debug!("deleteStream without a stream id");
            return Ok(());
        };
        let stream_id = stream_id as u32;

        let removed = {
            let mut streams = context.streams().lock().await;
            streams.remove(stream_id)
        };

        match removed {
            Ok(mut net_stream) => {
                let was_recording = net_stream.is_recording();
                net_stream.detach(context.id(), context.broker()).await;

                if was_recording {
                    let info = StatusInfo::status(NS_RECORD_STOP, "Recording stopped");
                    context
                        .send_status(header.message_stream_id, &info)
                        .await?;
                }
            }
            Err(e) => debug!("deleteStream: {}", e),
        }

        Ok(())
    }
}
