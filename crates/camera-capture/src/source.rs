//! Pull-based frame sources

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::{CameraConfig, CameraError, CameraSource, VideoFrame};

/// A source of video frames, pulled one at a time by the processing loop.
///
/// `Ok(None)` marks the end of the stream.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError>;
}

/// Open the source described by `config`
pub fn open_source(config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
    match &config.source {
        CameraSource::Synthetic => Ok(Box::new(SyntheticCamera::new(config))),
        CameraSource::Directory { path, looped } => {
            Ok(Box::new(ImageDirSource::open(path, *looped, config.frame_interval())?))
        }
    }
}

/// Sleeps between frames to hold a target rate
struct Pacer {
    interval: Option<Duration>,
    next: Instant,
}

impl Pacer {
    fn new(interval: Option<Duration>) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    fn wait(&mut self) {
        let Some(interval) = self.interval else {
            return;
        };
        let now = Instant::now();
        if now < self.next {
            std::thread::sleep(self.next - now);
            self.next += interval;
        } else {
            // Fell behind: restart the schedule instead of bursting
            self.next = now + interval;
        }
    }
}

/// Moving gradient test pattern
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    sequence: u64,
    max_frames: Option<u64>,
    started: Instant,
    pacer: Pacer,
}

impl SyntheticCamera {
    pub fn new(config: &CameraConfig) -> Self {
        info!(
            "Opening synthetic camera {}x{} @ {}fps",
            config.width, config.height, config.fps
        );
        Self {
            width: config.width,
            height: config.height,
            sequence: 0,
            max_frames: None,
            started: Instant::now(),
            pacer: Pacer::new(config.frame_interval()),
        }
    }

    /// Stop after `max_frames` frames
    pub fn with_limit(mut self, max_frames: u64) -> Self {
        self.max_frames = Some(max_frames);
        self
    }
}

impl FrameSource for SyntheticCamera {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        if self.max_frames.is_some_and(|max| self.sequence >= max) {
            return Ok(None);
        }
        self.pacer.wait();

        let shift = (self.sequence % 256) as u32;
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height {
            for x in 0..self.width {
                data.push(((x + shift) % 256) as u8);
                data.push((y % 256) as u8);
                data.push(96);
            }
        }

        let frame = VideoFrame {
            data,
            width: self.width,
            height: self.height,
            timestamp_ns: self.started.elapsed().as_nanos() as u64,
            sequence: self.sequence,
        };
        self.sequence += 1;
        Ok(Some(frame))
    }
}

/// Replays still images from a directory
pub struct ImageDirSource {
    files: Vec<PathBuf>,
    index: usize,
    looped: bool,
    sequence: u64,
    started: Instant,
    pacer: Pacer,
}

impl ImageDirSource {
    pub fn open(
        dir: &Path,
        looped: bool,
        interval: Option<Duration>,
    ) -> Result<Self, CameraError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CameraError::Open(format!("{}: {}", dir.display(), e)))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CameraError::Open(format!(
                "no images found in {}",
                dir.display()
            )));
        }

        info!("Replaying {} images from {}", files.len(), dir.display());
        Ok(Self {
            files,
            index: 0,
            looped,
            sequence: 0,
            started: Instant::now(),
            pacer: Pacer::new(interval),
        })
    }

    /// Number of images in the replay set
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageDirSource {
    /// Files that fail to decode are skipped. Errors only when a full pass
    /// over the replay set yields nothing decodable.
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        self.pacer.wait();
        let mut failures = 0;
        loop {
            if self.index >= self.files.len() {
                if !self.looped {
                    debug!("Image replay finished after {} frames", self.sequence);
                    return Ok(None);
                }
                self.index = 0;
            }

            let path = &self.files[self.index];
            self.index += 1;

            match image::open(path) {
                Ok(image) => {
                    let frame = VideoFrame::from_rgb_image(
                        image.to_rgb8(),
                        self.started.elapsed().as_nanos() as u64,
                        self.sequence,
                    );
                    self.sequence += 1;
                    return Ok(Some(frame));
                }
                Err(e) => {
                    warn!("Skipping undecodable image {}: {}", path.display(), e);
                    failures += 1;
                    if failures >= self.files.len() {
                        return Err(CameraError::Stream(format!(
                            "no decodable images left to replay: {}",
                            e
                        )));
                    }
                }
            }
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png" | "bmp"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unpaced(width: u32, height: u32) -> CameraConfig {
        CameraConfig {
            width,
            height,
            fps: 0,
            ..Default::default()
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("camera-capture-{}-{}", name, std::process::id()))
    }

    #[test]
    fn test_synthetic_limit() {
        let mut camera = SyntheticCamera::new(&unpaced(8, 4)).with_limit(3);
        for expected in 0..3 {
            let frame = camera.next_frame().unwrap().unwrap();
            assert_eq!(frame.sequence, expected);
            assert_eq!(frame.data.len(), 8 * 4 * 3);
        }
        assert!(camera.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_synthetic_pattern_moves() {
        let mut camera = SyntheticCamera::new(&unpaced(4, 1));
        let first = camera.next_frame().unwrap().unwrap();
        let second = camera.next_frame().unwrap().unwrap();
        assert_eq!(first.get_pixel(0, 0), Some([0, 0, 96]));
        assert_eq!(second.get_pixel(0, 0), Some([1, 0, 96]));
    }

    #[test]
    fn test_image_dir_missing() {
        let result = ImageDirSource::open(Path::new("/nonexistent/frames"), false, None);
        assert!(matches!(result, Err(CameraError::Open(_))));
    }

    #[test]
    fn test_image_dir_replay() {
        let dir = temp_dir("replay");
        std::fs::create_dir_all(&dir).unwrap();
        for (i, shade) in [10u8, 200].iter().enumerate() {
            let img = image::RgbImage::from_pixel(6, 4, image::Rgb([*shade, 0, 0]));
            img.save(dir.join(format!("{:03}.png", i))).unwrap();
        }
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let mut source = ImageDirSource::open(&dir, false, None).unwrap();
        assert_eq!(source.len(), 2);
        let a = source.next_frame().unwrap().unwrap();
        let b = source.next_frame().unwrap().unwrap();
        assert_eq!(a.get_pixel(0, 0), Some([10, 0, 0]));
        assert_eq!(b.get_pixel(0, 0), Some([200, 0, 0]));
        assert_eq!((b.width, b.height), (6, 4));
        assert!(source.next_frame().unwrap().is_none());

        let mut looped = ImageDirSource::open(&dir, true, None).unwrap();
        for _ in 0..5 {
            assert!(looped.next_frame().unwrap().is_some());
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_image_dir_skips_corrupt_files() {
        let dir = temp_dir("corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        image::RgbImage::from_pixel(4, 4, image::Rgb([50, 0, 0]))
            .save(dir.join("000.png"))
            .unwrap();
        std::fs::write(dir.join("001.jpg"), b"not a jpeg").unwrap();
        image::RgbImage::from_pixel(4, 4, image::Rgb([150, 0, 0]))
            .save(dir.join("002.png"))
            .unwrap();

        let mut source = ImageDirSource::open(&dir, false, None).unwrap();
        assert_eq!(source.len(), 3);
        let a = source.next_frame().unwrap().unwrap();
        let b = source.next_frame().unwrap().unwrap();
        assert_eq!(a.get_pixel(0, 0), Some([50, 0, 0]));
        assert_eq!(b.get_pixel(0, 0), Some([150, 0, 0]));
        assert_eq!(b.sequence, 1);
        assert!(source.next_frame().unwrap().is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_image_dir_all_corrupt_errors() {
        let dir = temp_dir("broken");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a.jpg"), b"garbage").unwrap();
        std::fs::write(dir.join("b.png"), b"garbage").unwrap();

        let mut source = ImageDirSource::open(&dir, true, None).unwrap();
        assert!(matches!(source.next_frame(), Err(CameraError::Stream(_))));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_open_source_directory() {
        let dir = temp_dir("open");
        std::fs::create_dir_all(&dir).unwrap();
        image::RgbImage::from_pixel(3, 2, image::Rgb([7, 7, 7]))
            .save(dir.join("only.png"))
            .unwrap();

        let config = CameraConfig {
            source: CameraSource::Directory {
                path: dir.clone(),
                looped: false,
            },
            fps: 0,
            ..Default::default()
        };
        let mut source = open_source(&config).unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!((frame.width, frame.height), (3, 2));
        assert!(source.next_frame().unwrap().is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_open_source_synthetic() {
        let mut source = open_source(&unpaced(2, 2)).unwrap();
        assert!(source.next_frame().unwrap().is_some());
    }
}
