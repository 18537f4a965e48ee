use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};
use tokio::task::JoinHandle;

use crate::broker::{BrokerStream, StreamEvent, SubscriberQueue};
use crate::muxer::avc::AvcConfig;
use crate::muxer::slicer::{DashSlicer, SegmentFileWriter, SlicerFactory};
use crate::{Error, Result};

/// Queue depth for the recorder's synthetic subscription; recording tails
/// the live edge and never throttles the publisher
const RECORDER_QUEUE_DEPTH: usize = 1024;

/// A recording attachment: a synthetic subscriber feeding the fMP4 slicer
pub struct StreamRecorder {
    queue_id: uuid::Uuid,
    stream: Arc<BrokerStream>,
    task: JoinHandle<()>,
}

impl StreamRecorder {
    /// Attach a recorder to a stream. Segments land in `dir` named after
    /// `stream_name`.
    pub async fn start(
        stream: Arc<BrokerStream>,
        factory: &dyn SlicerFactory,
        dir: &Path,
        stream_name: &str,
    ) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            Error::stream(format!(
                "Cannot create recording directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let handler = SegmentFileWriter::new(dir, stream_name);
        let slicer = factory.create(Box::new(handler));

        let queue = Arc::new(SubscriberQueue::new(RECORDER_QUEUE_DEPTH));
        let queue_id = queue.id;
        stream.subscribe(queue.clone()).await;

        let name = stream_name.to_string();
        let task = tokio::spawn(run_recorder(queue, slicer, name));

        Ok(StreamRecorder {
            queue_id,
            stream,
            task,
        })
    }

    /// Detach from the stream; the task drains and exits
    pub async fn stop(self) {
        self.stream.unsubscribe(self.queue_id).await;
        let _ = self.task.await;
    }
}

async fn run_recorder(queue: Arc<SubscriberQueue>, mut slicer: Box<dyn DashSlicer>, name: String) {
    loop {
        match queue.pop().await {
            Ok(event) => {
                if let Err(e) = feed_slicer(slicer.as_mut(), &event) {
                    warn!("Recorder for '{}' dropped a frame: {}", name, e);
                }
            }
            Err(_) => {
                debug!("Recorder for '{}' finished", name);
                return;
            }
        }
    }
}

/// Forward one stream event into the slicer.
///
/// Audio payloads lose their 2-byte tag prefix. An AVC configuration frame
/// is decoded into SPS/PPS NALs; other video frames are length-prefixed
/// NALU sequences. Every NAL is rewrapped with a 3-byte start code.
pub fn feed_slicer(slicer: &mut dyn DashSlicer, event: &StreamEvent) -> Result<()> {
    match event {
        StreamEvent::Audio(frame) => {
            if frame.payload.len() > 2 {
                slicer.add_aac_frame(&frame.payload[2..])?;
            }
            Ok(())
        }
        StreamEvent::Video(frame) => feed_video(slicer, &frame.payload),
        _ => Ok(()),
    }
}

fn feed_video(slicer: &mut dyn DashSlicer, payload: &[u8]) -> Result<()> {
    if payload.len() <= 5 {
        return Ok(());
    }
    let body = &payload[5..];

    if payload[0] == 0x17 && payload[1] == 0 {
        let config = AvcConfig::parse(body)?;
        for nal in config.sps.iter().chain(config.pps.iter()) {
            slicer.add_h264_nals(start_coded(nal))?;
        }
        return Ok(());
    }

    // Length-prefixed NALU sequence
    let mut offset = 0;
    while offset + 4 <= body.len() {
        let size = u32::from_be_bytes([
            body[offset],
            body[offset + 1],
            body[offset + 2],
            body[offset + 3],
        ]) as usize;
        offset += 4;

        if size == 0 || body.len() < offset + size {
            return Err(Error::stream("Malformed NALU length prefix"));
        }

        slicer.add_h264_nals(start_coded(&body[offset..offset + size]))?;
        offset += size;
    }

    Ok(())
}

/// Rewrap a NAL with the 3-byte Annex B start code
fn start_coded(nal: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(3 + nal.len());
    out.extend_from_slice(&[0, 0, 1]);
    out.extend_from_slice(nal);
    out
}
