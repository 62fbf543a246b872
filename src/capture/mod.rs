/// Face capture and recognition
///
/// This module handles:
/// - Upload validation and preview thumbnails (still.rs)
/// - The selfie camera and its error classification (camera.rs)
/// - The recognition backend boundary (recognition.rs)
/// - The capture flow state machine tying them together (flow.rs)

pub mod camera;
pub mod flow;
pub mod recognition;
pub mod still;
