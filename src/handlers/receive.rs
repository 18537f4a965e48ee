use std::sync::Arc;

use log::debug;

use crate::connection::ConnectionContext;
use crate::handlers::CommandHandler;
use crate::protocol::{
    ReceiveArgs, RtmpCommand, RtmpHeader, StatusInfo, NS_PLAY_START, NS_SEEK_NOTIFY,
};
use crate::Result;

/// Which media flow a receive command toggles
#[derive(Clone, Copy)]
enum Media {
    Audio,
    Video,
}

async fn toggle_receive(
    media: Media,
    command: RtmpCommand,
    header: &RtmpHeader,
    context: Arc<ConnectionContext>,
) -> Result<()> {
    let stream_id = header.message_stream_id;

    let flag = match ReceiveArgs::parse(&command) {
        Ok(args) => args.flag,
        Err(e) => {
            debug!("Bad receive arguments: {}", e);
            return Ok(());
        }
    };

    let changed = {
        let streams = context.streams().lock().await;
        let Some(net_stream) = streams.get(stream_id) else {
            debug!("Receive toggle on unknown stream id {}", stream_id);
            return Ok(());
        };

        let current = match media {
            Media::Audio => net_stream.control.receive_audio(),
            Media::Video => net_stream.control.receive_video(),
        };
        if current == flag {
            false
        } else {
            match media {
                Media::Audio => net_stream.control.set_receive_audio(flag),
                Media::Video => net_stream.control.set_receive_video(flag),
            }
            true
        }
    };

    // Re-enabling a flow tells the client to resume rendering
    if changed && flag {
        context
            .send_status(
                stream_id,
                &StatusInfo::status(NS_SEEK_NOTIFY, "Seek notify"),
            )
            .await?;
        context
            .send_status(stream_id, &StatusInfo::status(NS_PLAY_START, "Play start"))
            .await?;
    }

    Ok(())
}

pub struct ReceiveAudioHandler;

#[async_trait::async_trait]
impl CommandHandler for ReceiveAudioHandler {
    fn command_name(&self) -> &str {
        "receiveAudio"
    }

    async fn handle(
        &self,
        command: RtmpCommand,
        header: &RtmpHeader,
        context: Arc<ConnectionContext>,
    ) -> Result<()> {
        toggle_receive(Media::Audio, command, header, context).await
    }
}

pub struct ReceiveVideoHandler;

#[async_trait::async_trait]
impl CommandHandler for ReceiveVideoHandler {
    fn command_name(&self) -> &str {
        "receiveVideo"
    }

    async fn handle(
        &self,
        command: RtmpCommand,
        header: &RtmpHeader,
        context: Arc<ConnectionContext>,
    ) -> Result<()> {
        toggle_receive(Media::Video, command, header, context).await
    }
}
