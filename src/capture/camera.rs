// Camera boundary: one consumer at a time, released right after a still is taken.
use std::io::ErrorKind;
use std::path::PathBuf;

use image::DynamicImage;
use log::{debug, warn};
use thiserror::Error;

/// Reasons a camera request can be refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("Camera access failed. Please allow camera permissions and try again.")]
    PermissionDenied,
    #[error("Camera access failed. No camera found on this device.")]
    NoDevice,
    #[error("Camera access failed. Camera is being used by another application.")]
    DeviceBusy,
    #[error("Camera access is not supported by this runtime.")]
    Unsupported,
    #[error("Camera access failed. Please check your camera settings and try again. ({0})")]
    Other(String),
}

impl CameraError {
    /// Denials the user can resolve themselves (permissions, plugging a device in, closing another app).
    pub fn is_user_actionable(&self) -> bool {
        !matches!(self, CameraError::Unsupported)
    }
}

/// A live feed from which single frames can be grabbed.
pub trait VideoStream: Send {
    fn capture_frame(&mut self) -> Result<DynamicImage, CameraError>;
    fn stop(&mut self);
    fn is_active(&self) -> bool;
}

/// Source of video streams (the device camera).
pub trait Camera: Send {
    fn acquire(&mut self) -> Result<Box<dyn VideoStream>, CameraError>;
}

/// Holds an acquired stream and stops it on release or drop.
pub struct CameraLease {
    stream: Option<Box<dyn VideoStream>>,
}

impl CameraLease {
    pub fn acquire(camera: &mut dyn Camera) -> Result<Self, CameraError> {
        let stream = camera.acquire()?;
        debug!("Camera stream acquired");
        Ok(CameraLease {
            stream: Some(stream),
        })
    }

    pub fn capture_frame(&mut self) -> Result<DynamicImage, CameraError> {
        match self.stream.as_mut() {
            Some(stream) if stream.is_active() => stream.capture_frame(),
            _ => Err(CameraError::Other("camera not ready".to_string())),
        }
    }

    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if stream.is_active() {
                stream.stop();
            }
            debug!("Camera stream released");
        }
    }

    pub fn is_held(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.release();
    }
}

/// Camera backed by a still image on disk, for headless runs.
pub struct StillImageCamera {
    path: PathBuf,
}

impl StillImageCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StillImageCamera { path: path.into() }
    }
}

impl Camera for StillImageCamera {
    fn acquire(&mut self) -> Result<Box<dyn VideoStream>, CameraError> {
        let bytes = std::fs::read(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CameraError::NoDevice,
            ErrorKind::PermissionDenied => CameraError::PermissionDenied,
            _ => CameraError::Other(e.to_string()),
        })?;
        Ok(Box::new(StillImageStream {
            bytes,
            active: true,
        }))
    }
}

struct StillImageStream {
    bytes: Vec<u8>,
    active: bool,
}

impl VideoStream for StillImageStream {
    fn capture_frame(&mut self) -> Result<DynamicImage, CameraError> {
        image::load_from_memory(&self.bytes).map_err(|e| {
            warn!("Could not decode still frame: {}", e);
            CameraError::Other(format!("unreadable frame: {}", e))
        })
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
