use std::sync::Arc;

use log::debug;

use crate::connection::{ConnectionContext, NetStreamState};
use crate::handlers::CommandHandler;
use crate::protocol::{
    PauseArgs, RtmpCommand, RtmpHeader, StatusInfo, NS_PAUSE_NOTIFY, NS_PLAY_FAILED,
    NS_SEEK_INVALID_TIME, NS_UNPAUSE_NOTIFY,
};
use crate::Result;

pub struct PauseHandler;

#[async_trait::async_trait]
impl CommandHandler for PauseHandler {
    fn command_name(&self) -> &str {
        "pause"
    }

    async fn handle(
        &self,
        command: RtmpCommand,
        header: &RtmpHeader,
        context: Arc<ConnectionContext>,
    ) -> Result<()> {
        let stream_id = header.message_stream_id;

        let args = match PauseArgs::parse(&command) {
            Ok(args) => args,
            Err(e) => {
                debug!("Bad pause arguments: {}", e);
                let info = StatusInfo::error(NS_PLAY_FAILED, "Malformed pause");
                return context.send_status(stream_id, &info).await;
            }
        };

        let info = {
            let mut streams = context.streams().lock().await;
            let Some(net_stream) = streams.get_mut(stream_id) else {
                let info = StatusInfo::error(NS_PLAY_FAILED, "No such stream");
                drop(streams);
                return context.send_status(stream_id, &info).await;
            };

            match net_stream.state {
                NetStreamState::PlayingVod => {
                    // Position is bounds-checked against the source duration
                    if args.milliseconds < 0.0 || args.milliseconds > net_stream.duration_ms {
                        StatusInfo::error(NS_SEEK_INVALID_TIME, "Time out of range")
                    } else {
                        net_stream.control.set_paused(args.pause);
                        net_stream.current_time_ms = args.milliseconds;
                        if args.pause {
                            StatusInfo::status(NS_PAUSE_NOTIFY, "Pause notify")
                        } else {
                            StatusInfo::status(NS_UNPAUSE_NOTIFY, "Unpause notify")
                        }
                    }
                }
                NetStreamState::PlayingLive => {
                    // Live pause only gates delivery
                    net_stream.control.set_paused(args.pause);
                    if args.pause {
                        StatusInfo::status(NS_PAUSE_NOTIFY, "Pause notify")
                    } else {
                        StatusInfo::status(NS_UNPAUSE_NOTIFY, "Unpause notify")
                    }
                }
                _ => StatusInfo::error(NS_PLAY_FAILED, "Not playing"),
            }
        };

        context.send_status(stream_id, &info).await
    }
}
