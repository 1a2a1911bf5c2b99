pub mod camera;

pub use camera::{Camera, CameraError, CameraLease, StillImageCamera, VideoStream};
