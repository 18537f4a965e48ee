use std::sync::Arc;

use log::debug;

use crate::connection::{ConnectionContext, NetStreamState};
use crate::handlers::CommandHandler;
use crate::protocol::{
    RtmpCommand, RtmpHeader, SeekArgs, StatusInfo, NS_SEEK_FAILED, NS_SEEK_INVALID_TIME,
    NS_SEEK_NOTIFY,
};
use crate::Result;

pub struct SeekHandler;

#[async_trait::async_trait]
impl CommandHandler for SeekHandler {
    fn command_name(&self) -> &str {
        "seek"
    }

    async fn handle(
        &self,
        command: RtmpCommand,
        header: &RtmpHeader,
        context: Arc<ConnectionContext>,
    ) -> Result<()> {
        let stream_id = header.message_stream_id;

        let args = match SeekArgs::parse(&command) {
            Ok(args) => args,
            Err(e) => {
                debug!("Bad seek arguments: {}", e);
                let info = StatusInfo::error(NS_SEEK_FAILED, "Malformed seek");
                return context.send_status(stream_id, &info).await;
            }
        };

        let info = {
            let mut streams = context.streams().lock().await;
            match streams.get_mut(stream_id) {
                // Seeking is a VOD operation
                Some(net_stream) if net_stream.state == NetStreamState::PlayingVod => {
                    if args.milliseconds >= 0.0 && args.milliseconds <= net_stream.duration_ms {
                        net_stream.current_time_ms = args.milliseconds;
                        StatusInfo::status(NS_SEEK_NOTIFY, "Seek notify")
                    } else {
                        StatusInfo::error(NS_SEEK_INVALID_TIME, "Seek time out of range")
                    }
                }
                _ => StatusInfo::error(NS_SEEK_FAILED, "Seek failed"),
            }
        };

        context.send_status(stream_id, &info).await
    }
}
