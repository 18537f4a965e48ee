use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::broker::{BrokerStream, QueueEnd, StreamBroker, StreamEvent, SubscriberQueue};
use crate::muxer::StreamRecorder;
use crate::protocol::{
    make_audio_packet, make_data_packet, make_video_packet, RtmpCommand, RtmpHeader, RtmpPacket,
    StatusInfo, NS_PLAY_INSUFFICIENT_BW,
};

/// NetStream lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetStreamState {
    Idle,
    Publishing,
    PlayingLive,
    PlayingVod,
}

/// Shared playback switches flipped by pause/receiveAudio/receiveVideo
/// while the delivery task runs
pub struct PlaybackControl {
    paused: AtomicBool,
    receive_audio: AtomicBool,
    receive_video: AtomicBool,
}

impl PlaybackControl {
    pub fn new() -> Self {
        PlaybackControl {
            paused: AtomicBool::new(false),
            receive_audio: AtomicBool::new(true),
            receive_video: AtomicBool::new(true),
        }
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn set_receive_audio(&self, flag: bool) {
        self.receive_audio.store(flag, Ordering::Release);
    }

    pub fn receive_audio(&self) -> bool {
        self.receive_audio.load(Ordering::Acquire)
    }

    pub fn set_receive_video(&self, flag: bool) {
        self.receive_video.store(flag, Ordering::Release);
    }

    pub fn receive_video(&self) -> bool {
        self.receive_video.load(Ordering::Acquire)
    }
}

impl Default for PlaybackControl {
    fn default() -> Self {
        PlaybackControl::new()
    }
}

/// What a NetStream is attached to in the broker
enum Attachment {
    Publisher {
        stream: Arc<BrokerStream>,
        recorder: Option<StreamRecorder>,
    },
    Subscriber {
        stream: Arc<BrokerStream>,
        queue_id: Uuid,
    },
}

/// A logical media stream inside a NetConnection
pub struct NetStream {
    /// Stream id, unique per connection, allocated from 1
    pub id: u32,

    /// Published or played name
    pub name: Option<String>,

    /// Lifecycle state
    pub state: NetStreamState,

    /// Playback switches shared with the delivery task
    pub control: Arc<PlaybackControl>,

    /// Playback position (VOD)
    pub current_time_ms: f64,

    /// Source duration (VOD)
    pub duration_ms: f64,

    attachment: Option<Attachment>,
}

impl NetStream {
    /// Create an idle stream
    pub fn new(id: u32) -> Self {
        NetStream {
            id,
            name: None,
            state: NetStreamState::Idle,
            control: Arc::new(PlaybackControl::new()),
            current_time_ms: 0.0,
            duration_ms: 0.0,
            attachment: None,
        }
    }

    /// Check lifecycle state
    pub fn is_idle(&self) -> bool {
        self.state == NetStreamState::Idle
    }

    pub fn is_publishing(&self) -> bool {
        self.state == NetStreamState::Publishing
    }

    pub fn is_playing(&self) -> bool {
        matches!(
            self.state,
            NetStreamState::PlayingLive | NetStreamState::PlayingVod
        )
    }

    /// True while a recorder is attached to the published stream
    pub fn is_recording(&self) -> bool {
        matches!(
            self.attachment,
            Some(Attachment::Publisher {
                recorder: Some(_),
                ..
            })
        )
    }

    /// Broker stream this NetStream feeds as a publisher
    pub fn published_stream(&self) -> Option<Arc<BrokerStream>> {
        match self.attachment {
            Some(Attachment::Publisher { ref stream, .. }) => Some(stream.clone()),
            _ => None,
        }
    }

    /// Bind as the publisher of a broker stream
    pub fn attach_publisher(
        &mut self,
        name: String,
        stream: Arc<BrokerStream>,
        recorder: Option<StreamRecorder>,
    ) {
        self.name = Some(name);
        self.state = NetStreamState::Publishing;
        self.attachment = Some(Attachment::Publisher { stream, recorder });
    }

    /// Bind as a subscriber of a broker stream
    pub fn attach_subscriber(
        &mut self,
        name: String,
        state: NetStreamState,
        stream: Arc<BrokerStream>,
        queue_id: Uuid,
    ) {
        self.name = Some(name);
        self.state = state;
        self.attachment = Some(Attachment::Subscriber { stream, queue_id });
    }

    /// Detach from the broker and return to idle. Idempotent; never leaks
    /// a subscription or the publisher slot.
    pub async fn detach(&mut self, session_id: Uuid, broker: &StreamBroker) {
        match self.attachment.take() {
            Some(Attachment::Publisher { stream, recorder }) => {
                if let Some(recorder) = recorder {
                    recorder.stop().await;
                }
                stream.clear_publisher(session_id).await;
                broker.remove_if_idle(stream.key()).await;
            }
            Some(Attachment::Subscriber { stream, queue_id }) => {
                stream.unsubscribe(queue_id).await;
                broker.remove_if_idle(stream.key()).await;
            }
            None => {}
        }

        self.name = None;
        self.state = NetStreamState::Idle;
        self.current_time_ms = 0.0;
        self.duration_ms = 0.0;
        self.control.set_paused(false);
    }
}

/// Drive a subscriber queue onto a connection's outbound channel.
///
/// Frames are serialized with this NetStream's id and their source
/// timestamps; pause and the receive flags filter delivery without
/// detaching from the stream.
pub fn spawn_playback(
    queue: Arc<SubscriberQueue>,
    control: Arc<PlaybackControl>,
    outbound: mpsc::Sender<RtmpPacket>,
    stream_id: u32,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match queue.pop().await {
                Ok(event) => {
                    if !deliver(&event, &control, &outbound, stream_id).await {
                        return;
                    }
                }
                Err(QueueEnd::Closed) => return,
                Err(QueueEnd::Overflowed) => {
                    let info = StatusInfo::error(
                        NS_PLAY_INSUFFICIENT_BW,
                        "Insufficient bandwidth, dropping subscriber",
                    );
                    let _ = send_status(&outbound, stream_id, &info).await;
                    return;
                }
            }
        }
    })
}

async fn deliver(
    event: &StreamEvent,
    control: &PlaybackControl,
    outbound: &mpsc::Sender<RtmpPacket>,
    stream_id: u32,
) -> bool {
    let packet = match event {
        StreamEvent::Audio(frame) => {
            if control.is_paused() || !control.receive_audio() {
                return true;
            }
            make_audio_packet(frame.payload.clone(), frame.timestamp, stream_id)
        }
        StreamEvent::Video(frame) => {
            if control.is_paused() || !control.receive_video() {
                return true;
            }
            make_video_packet(frame.payload.clone(), frame.timestamp, stream_id)
        }
        StreamEvent::Data { payload, .. } => {
            if control.is_paused() {
                return true;
            }
            make_data_packet(payload.as_ref().clone(), 0, stream_id)
        }
        StreamEvent::ClearData { handler } => {
            debug!("Data frame '{}' cleared upstream", handler);
            return true;
        }
        StreamEvent::PublishStart => {
            debug!("Publisher arrived on subscribed stream {}", stream_id);
            return true;
        }
        StreamEvent::Unpublish => {
            let info = StatusInfo::status(
                crate::protocol::NS_PLAY_UNPUBLISH_NOTIFY,
                "The stream is no longer published",
            );
            return send_status(outbound, stream_id, &info).await;
        }
    };

    outbound.send(packet).await.is_ok()
}

async fn send_status(
    outbound: &mpsc::Sender<RtmpPacket>,
    stream_id: u32,
    info: &StatusInfo,
) -> bool {
    let command = RtmpCommand::on_status(info);
    let payload = match command.encode() {
        Ok(payload) => payload,
        Err(_) => return false,
    };
    let header = RtmpHeader::command(0, payload.len() as u32, stream_id);
    outbound.send(RtmpPacket::new(header, payload)).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{MediaFrame, StreamKey, StreamKind};

    fn test_stream() -> Arc<BrokerStream> {
        Arc::new(BrokerStream::new(
            StreamKey::new("live", "_definst_", "cam"),
            StreamKind::Idle,
            0.0,
        ))
    }

    #[tokio::test]
    async fn test_playback_serializes_with_stream_id_and_timestamp() {
        let queue = Arc::new(SubscriberQueue::new(16));
        let control = Arc::new(PlaybackControl::new());
        let (tx, mut rx) = mpsc::channel(16);

        let task = spawn_playback(queue.clone(), control, tx, 7);

        queue.push(StreamEvent::Video(Arc::new(MediaFrame::video(
            1234,
            vec![0x17, 0x01, 0, 0, 0],
        ))));

        let packet = rx.recv().await.unwrap();
        assert!(packet.is_video());
        assert_eq!(packet.message_stream_id(), 7);
        assert_eq!(packet.timestamp(), 1234);

        queue.close();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_flags_filter_delivery() {
        let queue = Arc::new(SubscriberQueue::new(16));
        let control = Arc::new(PlaybackControl::new());
        control.set_receive_audio(false);
        let (tx, mut rx) = mpsc::channel(16);

        let task = spawn_playback(queue.clone(), control, tx, 1);

        queue.push(StreamEvent::Audio(Arc::new(MediaFrame::audio(
            0,
            vec![0xAF, 0x01],
        ))));
        queue.push(StreamEvent::Video(Arc::new(MediaFrame::video(
            40,
            vec![0x17, 0x01],
        ))));

        // Only the video frame comes through
        let packet = rx.recv().await.unwrap();
        assert!(packet.is_video());

        queue.close();
        task.await.unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_pause_stops_delivery() {
        let queue = Arc::new(SubscriberQueue::new(16));
        let control = Arc::new(PlaybackControl::new());
        control.set_paused(true);
        let (tx, mut rx) = mpsc::channel(16);

        let task = spawn_playback(queue.clone(), control.clone(), tx, 1);
        queue.push(StreamEvent::Video(Arc::new(MediaFrame::video(
            0,
            vec![0x17, 0x01],
        ))));

        queue.close();
        task.await.unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_unpublish_becomes_status() {
        let queue = Arc::new(SubscriberQueue::new(16));
        let control = Arc::new(PlaybackControl::new());
        let (tx, mut rx) = mpsc::channel(16);

        let task = spawn_playback(queue.clone(), control, tx, 3);
        queue.push(StreamEvent::Unpublish);

        let packet = rx.recv().await.unwrap();
        let command = RtmpCommand::decode(&packet.payload).unwrap();
        assert_eq!(command.name, "onStatus");
        assert_eq!(
            command
                .argument(0)
                .and_then(|v| v.get_property("code"))
                .and_then(|v| v.as_string()),
            Some(crate::protocol::NS_PLAY_UNPUBLISH_NOTIFY)
        );

        queue.close();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_overflow_sends_insufficient_bw() {
        let queue = Arc::new(SubscriberQueue::new(1));
        let control = Arc::new(PlaybackControl::new());
        let (tx, mut rx) = mpsc::channel(16);

        // Force the overflow end state before the task drains anything;
        // codec headers are never shed, so the second one ends the queue
        queue.push(StreamEvent::Video(Arc::new(MediaFrame::video(
            0,
            vec![0x17, 0x00, 0, 0, 0],
        ))));
        queue.push(StreamEvent::Video(Arc::new(MediaFrame::video(
            10,
            vec![0x17, 0x00, 0, 0, 0],
        ))));
        assert!(queue.is_ended());

        let task = spawn_playback(queue.clone(), control, tx, 1);
        task.await.unwrap();

        // The retained header drains first, then the error status
        let first = rx.recv().await.unwrap();
        assert!(first.is_video());
        let second = rx.recv().await.unwrap();
        let command = RtmpCommand::decode(&second.payload).unwrap();
        assert_eq!(
            command
                .argument(0)
                .and_then(|v| v.get_property("code"))
                .and_then(|v| v.as_string()),
            Some(NS_PLAY_INSUFFICIENT_BW)
        );
    }

    #[tokio::test]
    async fn test_detach_clears_publisher_slot() {
        let broker = StreamBroker::new();
        let key = StreamKey::new("live", "_definst_", "cam");
        let stream = broker.acquire_for_publish(&key).await;
        let session = Uuid::new_v4();
        stream.set_publisher(session).await.unwrap();

        let mut net_stream = NetStream::new(1);
        net_stream.attach_publisher("cam".to_string(), stream.clone(), None);
        assert!(net_stream.is_publishing());

        net_stream.detach(session, &broker).await;
        assert!(net_stream.is_idle());
        assert!(!stream.is_publishing().await);
        assert!(broker.is_empty().await);

        // Idempotent
        net_stream.detach(session, &broker).await;
    }
}
