use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, error};

use crate::Result;

/// Receives finished init and media segments from a slicer.
///
/// Implementations decide where segments go; the file writer below is the
/// DASH-directory layout players fetch over HTTP.
pub trait SegmentHandler: Send {
    fn video_header(&mut self, data: &[u8]);
    fn video_segment(&mut self, data: &[u8], timestamp: i64);
    fn audio_header(&mut self, data: &[u8]);
    fn audio_segment(&mut self, data: &[u8], timestamp: i64);
}

/// The fragmented-MP4 slicer seam.
///
/// The box-writing library behind it consumes normalized H.264 NALs (3-byte
/// start codes) and raw AAC frames, and emits segments through the
/// `SegmentHandler` it was built around.
pub trait DashSlicer: Send {
    fn add_aac_frame(&mut self, frame: &[u8]) -> Result<()>;
    fn add_h264_nals(&mut self, nals: Vec<u8>) -> Result<()>;
}

/// Builds a slicer around a segment handler; one slicer per recorded stream
pub trait SlicerFactory: Send + Sync {
    fn create(&self, handler: Box<dyn SegmentHandler>) -> Box<dyn DashSlicer>;
}

/// Writes segments as `<stream>_{audio|video}0_{init|<ts>}_mp4.m4s` files
/// under a directory
pub struct SegmentFileWriter {
    dir: PathBuf,
    stream_name: String,
}

impl SegmentFileWriter {
    pub fn new(dir: impl Into<PathBuf>, stream_name: impl Into<String>) -> Self {
        SegmentFileWriter {
            dir: dir.into(),
            stream_name: stream_name.into(),
        }
    }

    fn segment_path(&self, track: &str, part: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}0_{}_mp4.m4s", self.stream_name, track, part))
    }

    /// Create-or-truncate write; a re-emitted segment must fully replace
    /// the old bytes
    fn save(&self, path: &Path, data: &[u8]) {
        let result = File::create(path).and_then(|mut file| file.write_all(data));
        match result {
            Ok(()) => debug!("Wrote segment {}", path.display()),
            Err(e) => error!("Failed to write segment {}: {}", path.display(), e),
        }
    }
}

impl SegmentHandler for SegmentFileWriter {
    fn video_header(&mut self, data: &[u8]) {
        self.save(&self.segment_path("video", "init"), data);
    }

    fn video_segment(&mut self, data: &[u8], timestamp: i64) {
        self.save(&self.segment_path("video", &timestamp.to_string()), data);
    }

    fn audio_header(&mut self, data: &[u8]) {
        self.save(&self.segment_path("audio", "init"), data);
    }

    fn audio_segment(&mut self, data: &[u8], timestamp: i64) {
        self.save(&self.segment_path("audio", &timestamp.to_string()), data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rtmpd-segments-{}-{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_segment_file_naming() {
        let dir = temp_dir("naming");
        let mut writer = SegmentFileWriter::new(&dir, "cam");

        writer.video_header(&[1, 2, 3]);
        writer.video_segment(&[4, 5], 12000);
        writer.audio_header(&[6]);
        writer.audio_segment(&[7, 8, 9], 12000);

        assert_eq!(
            std::fs::read(dir.join("cam_video0_init_mp4.m4s")).unwrap(),
            vec![1, 2, 3]
        );
        assert_eq!(
            std::fs::read(dir.join("cam_video0_12000_mp4.m4s")).unwrap(),
            vec![4, 5]
        );
        assert_eq!(
            std::fs::read(dir.join("cam_audio0_init_mp4.m4s")).unwrap(),
            vec![6]
        );
        assert_eq!(
            std::fs::read(dir.join("cam_audio0_12000_mp4.m4s")).unwrap(),
            vec![7, 8, 9]
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_rewrite_truncates() {
        let dir = temp_dir("truncate");
        let mut writer = SegmentFileWriter::new(&dir, "cam");

        writer.video_header(&[1u8; 100]);
        writer.video_header(&[2u8; 10]);

        // The shorter rewrite fully replaces the longer original
        assert_eq!(
            std::fs::read(dir.join("cam_video0_init_mp4.m4s")).unwrap(),
            vec![2u8; 10]
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
