use std::sync::Arc;

use log::debug;

use crate::connection::ConnectionContext;
use crate::handlers::CommandHandler;
use crate::protocol::{RtmpCommand, RtmpHeader, StatusInfo, NS_RECORD_STOP};
use crate::Result;

pub struct CloseStreamHandler;

#[async_trait::async_trait]
impl CommandHandler for CloseStreamHandler {
    fn command_name(&self) -> &str {
        "closeStream"
    }

    async fn handle(
        &self,
        _command: RtmpCommand,
        header: &RtmpHeader,
        context: Arc<ConnectionContext>,
    ) -> Result<()> {
        let stream_id = header.message_stream_id;

        let was_recording = {
            let mut streams = context.streams().lock().await;
            let Some(net_stream) = streams.get_mut(stream_id) else {
                debug!("closeStream on unknown stream id {}", stream_id);
                return Ok(());
            };

            let was_recording = net_stream.is_recording();
            net_stream.detach(context.id(), context.broker()).await;
            was_recording
        };

        if was_recording {
            let info = StatusInfo::status(NS_RECORD_STOP, "Recording stopped");
            context.send_status(stream_id, &info).await?;
        }

        Ok(())
    }
}
