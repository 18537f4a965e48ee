use std::sync::Arc;

use log::{debug, info};

use crate::broker::{StreamKind, SubscriberQueue};
use crate::connection::{spawn_playback, ConnectionContext, NetStreamState};
use crate::handlers::CommandHandler;
use crate::protocol::{
    PlayArgs, RtmpCommand, RtmpData, RtmpHeader, StatusInfo, UserControlEvent, NS_PLAY_FAILED,
    NS_PLAY_RESET, NS_PLAY_START, NS_PLAY_STREAM_NOT_FOUND,
};
use crate::Result;

pub struct PlayHandler;

#[async_trait::async_trait]
impl CommandHandler for PlayHandler {
    fn command_name(&self) -> &str {
        "play"
    }

    async fn handle(
        &self,
        command: RtmpCommand,
        header: &RtmpHeader,
        context: Arc<ConnectionContext>,
    ) -> Result<()> {
        let stream_id = header.message_stream_id;

        let Some(target) = context.app().await else {
            debug!("Play before connect");
            let info = StatusInfo::error(NS_PLAY_FAILED, "Not connected");
            return context.send_status(stream_id, &info).await;
        };

        let args = match PlayArgs::parse(&command) {
            Ok(args) => args,
            Err(e) => {
                debug!("Bad play arguments: {}", e);
                let info = StatusInfo::error(NS_PLAY_FAILED, "No stream name provided");
                return context.send_status(stream_id, &info).await;
            }
        };

        if !context.config().can_read(&target.app) {
            debug!("Play denied for app '{}'", target.app);
            let info = StatusInfo::error(NS_PLAY_FAILED, "No read access");
            return context.send_status(stream_id, &info).await;
        }

        // The stream must exist and hold no other role
        {
            let streams = context.streams().lock().await;
            match streams.get(stream_id) {
                Some(net_stream) if net_stream.is_idle() => {}
                Some(_) => {
                    debug!("Play on a stream that already has a role");
                    let info = StatusInfo::error(NS_PLAY_FAILED, "Stream already active");
                    drop(streams);
                    return context.send_status(stream_id, &info).await;
                }
                None => {
                    debug!("Play on unknown stream id {}", stream_id);
                    let info = StatusInfo::error(NS_PLAY_FAILED, "No such stream");
                    drop(streams);
                    return context.send_status(stream_id, &info).await;
                }
            }
        }

        let key = context.stream_key(&args.name).await?;
        let Some(broker_stream) = context.broker().resolve_for_play(&key, args.start).await
        else {
            debug!("Play: stream {} not found (start {})", key, args.start);
            let info = StatusInfo::error(NS_PLAY_STREAM_NOT_FOUND, "Stream not found");
            return context.send_status(stream_id, &info).await;
        };

        info!("PLAY {} start={} by {}", key, args.start, context.peer_addr());

        let (state, duration_ms) = match broker_stream.kind().await {
            StreamKind::Vod => (
                NetStreamState::PlayingVod,
                broker_stream.duration_ms().await,
            ),
            _ => (NetStreamState::PlayingLive, 0.0),
        };

        // Status sequence precedes any replayed frame
        context
            .send_user_control(UserControlEvent::StreamBegin(stream_id))
            .await?;
        if args.reset {
            let info = StatusInfo::status(NS_PLAY_RESET, format!("Resetting {}", args.name));
            context.send_status(stream_id, &info).await?;
        }
        let info = StatusInfo::status(NS_PLAY_START, format!("Started playing {}", args.name))
            .with_client_id(context.client_id());
        context.send_status(stream_id, &info).await?;
        context
            .send_data(stream_id, &RtmpData::sample_access(true, true))
            .await?;

        // Subscribe; retained headers replay into the queue before live
        // frames reach it
        let queue = Arc::new(SubscriberQueue::new(
            context.config().subscriber_queue_len,
        ));
        let queue_id = queue.id;

        {
            let mut streams = context.streams().lock().await;
            if let Some(net_stream) = streams.get_mut(stream_id) {
                spawn_playback(
                    queue.clone(),
                    net_stream.control.clone(),
                    context.outbound(),
                    stream_id,
                );
                net_stream.attach_subscriber(
                    args.name.clone(),
                    state,
                    broker_stream.clone(),
                    queue_id,
                );
                net_stream.duration_ms = duration_ms;
                net_stream.current_time_ms = args.start.max(0.0);
            }
        }

        broker_stream.subscribe(queue).await;
        Ok(())
    }
}
