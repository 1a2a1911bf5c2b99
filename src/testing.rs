// Fakes shared by the unit tests.
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};

use crate::capture::{Camera, CameraError, VideoStream};
use crate::models::{BoundingBox, Descriptor, OcrConfiguration};
use crate::processing::{DetectorKind, FaceDetection, FaceEngine, OcrEngine};
use crate::utils::VerificationError;

pub fn png_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageOutputFormat::Png)
        .unwrap();
    buffer
}

pub fn test_frame() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(320, 240, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

/// A face in the middle of a 320x240 frame whose descriptor is 128 copies of `value`.
pub fn detection(value: f32) -> FaceDetection {
    FaceDetection {
        bbox: BoundingBox::new(100.0, 60.0, 80.0, 100.0),
        descriptor: Descriptor::new(vec![value; 128]),
        confidence: 0.9,
    }
}

#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Error(String),
    Delayed(Duration),
}

/// OCR engine answering each call with the next scripted reply, then with empty text.
pub struct ScriptedOcr {
    replies: Mutex<VecDeque<ScriptedReply>>,
    calls: AtomicUsize,
}

impl ScriptedOcr {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        ScriptedOcr {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrEngine for ScriptedOcr {
    async fn recognize(
        &self,
        _image: &[u8],
        _configuration: &OcrConfiguration,
        progress: &(dyn Fn(f32) + Send + Sync),
    ) -> Result<String, VerificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().unwrap().pop_front();
        progress(0.5);
        let result = match reply {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Error(message)) => Err(VerificationError::OcrError(message)),
            Some(ScriptedReply::Delayed(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(String::new())
            }
            None => Ok(String::new()),
        };
        progress(1.0);
        result
    }
}

/// Face engine with queued detections per detector and a configurable number of failed loads.
pub struct ScriptedFaces {
    primary: Mutex<VecDeque<Option<FaceDetection>>>,
    secondary: Mutex<VecDeque<Option<FaceDetection>>>,
    failing_loads: AtomicUsize,
    failing_detection: bool,
    load_calls: AtomicUsize,
    detect_calls: AtomicUsize,
}

impl ScriptedFaces {
    pub fn new() -> Self {
        ScriptedFaces {
            primary: Mutex::new(VecDeque::new()),
            secondary: Mutex::new(VecDeque::new()),
            failing_loads: AtomicUsize::new(0),
            failing_detection: false,
            load_calls: AtomicUsize::new(0),
            detect_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_primary(self, detections: Vec<Option<FaceDetection>>) -> Self {
        *self.primary.lock().unwrap() = detections.into();
        self
    }

    pub fn with_secondary(self, detections: Vec<Option<FaceDetection>>) -> Self {
        *self.secondary.lock().unwrap() = detections.into();
        self
    }

    pub fn failing_loads(self, count: usize) -> Self {
        self.failing_loads.store(count, Ordering::SeqCst);
        self
    }

    pub fn failing_detection(mut self) -> Self {
        self.failing_detection = true;
        self
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn detect_calls(&self) -> usize {
        self.detect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FaceEngine for ScriptedFaces {
    async fn load_models(&self) -> Result<(), VerificationError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_loads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_loads.store(remaining - 1, Ordering::SeqCst);
            return Err(VerificationError::ModelLoadError("weights not found".to_string()));
        }
        Ok(())
    }

    async fn detect(
        &self,
        _image: &DynamicImage,
        detector: DetectorKind,
    ) -> Result<Option<FaceDetection>, VerificationError> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_detection {
            return Err(VerificationError::FaceDetectionError("backend crashed".to_string()));
        }
        let queue = match detector {
            DetectorKind::Primary { .. } => &self.primary,
            DetectorKind::Secondary { .. } => &self.secondary,
        };
        let next = queue.lock().unwrap().pop_front().flatten();
        Ok(next)
    }
}

/// Camera handing out streams of [`test_frame`], tracking how many are still open.
pub struct FakeCamera {
    denial: Option<CameraError>,
    active: Arc<AtomicUsize>,
}

impl FakeCamera {
    pub fn new() -> Self {
        FakeCamera {
            denial: None,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn denying(error: CameraError) -> Self {
        FakeCamera {
            denial: Some(error),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn active_streams(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl Camera for FakeCamera {
    fn acquire(&mut self) -> Result<Box<dyn VideoStream>, CameraError> {
        if let Some(error) = &self.denial {
            return Err(error.clone());
        }
        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            active: self.active.clone(),
            open: true,
        }))
    }
}

struct FakeStream {
    active: Arc<AtomicUsize>,
    open: bool,
}

impl VideoStream for FakeStream {
    fn capture_frame(&mut self) -> Result<DynamicImage, CameraError> {
        if !self.open {
            return Err(CameraError::Other("stream stopped".to_string()));
        }
        Ok(test_frame())
    }

    fn stop(&mut self) {
        if self.open {
            self.open = false;
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_active(&self) -> bool {
        self.open
    }
}
