use std::sync::Arc;

use log::{debug, info, warn};

use crate::connection::ConnectionContext;
use crate::handlers::CommandHandler;
use crate::muxer::StreamRecorder;
use crate::protocol::{
    PublishArgs, RtmpCommand, RtmpHeader, StatusInfo, UserControlEvent, NS_PUBLISH_BADNAME,
    NS_PUBLISH_FAILED, NS_PUBLISH_START, NS_RECORD_FAILED, NS_RECORD_NO_ACCESS, NS_RECORD_START,
};
use crate::Result;

pub struct PublishHandler;

#[async_trait::async_trait]
impl CommandHandler for PublishHandler {
    fn command_name(&self) -> &str {
        "publish"
    }

    async fn handle(
        &self,
        command: RtmpCommand,
        header: &RtmpHeader,
        context: Arc<ConnectionContext>,
    ) -> Result<()> {
        let stream_id = header.message_stream_id;

        let Some(target) = context.app().await else {
            debug!("Publish before connect");
            let info = StatusInfo::error(NS_PUBLISH_FAILED, "Not connected");
            return context.send_status(stream_id, &info).await;
        };

        let args = match PublishArgs::parse(&command) {
            Ok(args) => args,
            Err(e) => {
                debug!("Bad publish arguments: {}", e);
                let info = StatusInfo::error(NS_PUBLISH_BADNAME, "No stream name provided");
                return context.send_status(stream_id, &info).await;
            }
        };

        if !context.config().can_write(&target.app) {
            debug!("Publish denied for app '{}'", target.app);
            let info = StatusInfo::error(NS_PUBLISH_FAILED, "No write access");
            return context.send_status(stream_id, &info).await;
        }

        // The stream must exist and hold no other role
        {
            let streams = context.streams().lock().await;
            match streams.get(stream_id) {
                Some(net_stream) if net_stream.is_idle() => {}
                Some(_) => {
                    debug!("Publish on a stream that already has a role");
                    let info = StatusInfo::error(NS_PUBLISH_FAILED, "Stream already active");
                    drop(streams);
                    return context.send_status(stream_id, &info).await;
                }
                None => {
                    debug!("Publish on unknown stream id {}", stream_id);
                    let info = StatusInfo::error(NS_PUBLISH_FAILED, "No such stream");
                    drop(streams);
                    return context.send_status(stream_id, &info).await;
                }
            }
        }

        // Claim the broker slot
        let key = context.stream_key(&args.name).await?;
        let broker_stream = context.broker().acquire_for_publish(&key).await;

        if let Err(e) = broker_stream.set_publisher(context.id()).await {
            debug!("Publish refused: {}", e);
            let info = StatusInfo::error(NS_PUBLISH_BADNAME, "Stream already publishing");
            return context.send_status(stream_id, &info).await;
        }

        info!("PUBLISH {} as {:?} by {}", key, args.kind, context.peer_addr());

        // Recording modes attach the muxer before media flows
        let recorder = if args.kind.is_recorded() {
            start_recorder(&context, &broker_stream, &args.name, stream_id).await
        } else {
            None
        };
        let recording = recorder.is_some();

        {
            let mut streams = context.streams().lock().await;
            if let Some(net_stream) = streams.get_mut(stream_id) {
                net_stream.attach_publisher(args.name.clone(), broker_stream.clone(), recorder);
            }
        }

        context
            .send_user_control(UserControlEvent::StreamBegin(stream_id))
            .await?;

        let info = StatusInfo::status(
            NS_PUBLISH_START,
            format!("/{}/{} is now published.", target.app, args.name),
        )
        .with_client_id(context.client_id());
        context.send_status(stream_id, &info).await?;

        if recording {
            let info = StatusInfo::status(
                NS_RECORD_START,
                format!("Recording {}", args.name),
            );
            context.send_status(stream_id, &info).await?;
        }

        Ok(())
    }
}

/// Attach a recorder when the server is configured for it; failures are
/// reported on the stream but never kill the publish
async fn start_recorder(
    context: &Arc<ConnectionContext>,
    broker_stream: &Arc<crate::broker::BrokerStream>,
    name: &str,
    stream_id: u32,
) -> Option<StreamRecorder> {
    let config = context.config();
    let Some(factory) = context.slicer_factory() else {
        debug!("Recording requested but no slicer is configured");
        let info = StatusInfo::warning(NS_RECORD_NO_ACCESS, "Recording is not available");
        let _ = context.send_status(stream_id, &info).await;
        return None;
    };

    if !config.record_enabled {
        let info = StatusInfo::warning(NS_RECORD_NO_ACCESS, "Recording is disabled");
        let _ = context.send_status(stream_id, &info).await;
        return None;
    }

    match StreamRecorder::start(
        broker_stream.clone(),
        factory.as_ref(),
        &config.record_dir,
        name,
    )
    .await
    {
        Ok(recorder) => Some(recorder),
        Err(e) => {
            warn!("Recorder failed for '{}': {}", name, e);
            let info = StatusInfo::error(NS_RECORD_FAILED, "Could not start recording");
            let _ = context.send_status(stream_id, &info).await;
            None
        }
    }
}
