//! Camera capture for selfies
//!
//! `CameraCapture` owns the one camera session the capture flow may hold:
//! it opens the device, serves preview frames, takes still snapshots and
//! stops the stream again. Device access goes through the `CameraDevice`
//! port so the desktop backend can be swapped out.
//!
//! Opening is asynchronous (the OS may show a permission prompt that the
//! user never answers), so it is split into `begin_open`, which returns a
//! `'static` request to run in the background, and `finish_open`, which
//! applies the result. Every open and close bumps a ticket; a result that
//! arrives for an old ticket has its stream stopped on the spot.

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::still::{encode_jpeg, ImageInput};

/// An error as reported by the platform camera API, before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFault {
    /// A named error category (e.g. "NotAllowedError")
    Named { name: String, message: String },
    /// An OS-level failure from a native capture backend
    Io { kind: io::ErrorKind, message: String },
}

impl DeviceFault {
    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        DeviceFault::Named {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl From<io::Error> for DeviceFault {
    fn from(e: io::Error) -> Self {
        DeviceFault::Io {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl fmt::Display for DeviceFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceFault::Named { name, message } => write!(f, "{name}: {message}"),
            DeviceFault::Io { kind, message } => write!(f, "{kind:?}: {message}"),
        }
    }
}

/// Why the camera could not be used
///
/// Every variant has its own message and all of them can be retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("Camera access was denied. Allow camera access for SportShot in your system settings and try again.")]
    PermissionDenied,

    #[error("No camera was found on this device.")]
    NoDevice,

    #[error("Your camera is being used by another application. Close any apps that may be using it and try again.")]
    DeviceBusy,

    #[error("Your camera does not support the requested settings.")]
    ConstraintsUnsupported,

    #[error("Camera access was cancelled. Please try again.")]
    Aborted,

    #[error("Camera use was blocked for security reasons. Check your privacy settings.")]
    InsecureContext,

    #[error("Could not access your camera: {0}")]
    Unknown(String),
}

impl CameraError {
    /// Map a platform fault onto the closed error set
    pub fn classify(fault: &DeviceFault) -> Self {
        match fault {
            DeviceFault::Named { name, message } => match name.as_str() {
                "NotAllowedError" | "PermissionDeniedError" => CameraError::PermissionDenied,
                "NotFoundError" | "DevicesNotFoundError" => CameraError::NoDevice,
                "NotReadableError" | "TrackStartError" => CameraError::DeviceBusy,
                "OverconstrainedError" | "ConstraintNotSatisfiedError" | "TypeError" => {
                    CameraError::ConstraintsUnsupported
                }
                "AbortError" => CameraError::Aborted,
                "SecurityError" => CameraError::InsecureContext,
                _ => CameraError::Unknown(message.clone()),
            },
            DeviceFault::Io { kind, message } => match kind {
                io::ErrorKind::PermissionDenied => CameraError::PermissionDenied,
                io::ErrorKind::NotFound => CameraError::NoDevice,
                io::ErrorKind::AddrInUse | io::ErrorKind::WouldBlock => CameraError::DeviceBusy,
                io::ErrorKind::InvalidInput | io::ErrorKind::Unsupported => {
                    CameraError::ConstraintsUnsupported
                }
                io::ErrorKind::Interrupted => CameraError::Aborted,
                _ => CameraError::Unknown(message.clone()),
            },
        }
    }
}

/// Failure of `CameraCapture::snapshot`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("the camera preview is not ready yet")]
    NotReady,

    #[error(transparent)]
    Camera(#[from] CameraError),
}

/// What to ask the device for
///
/// Requests are always for the front-facing camera and video-only, so
/// there is no facing or audio field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        VideoConstraints {
            ideal_width: 640,
            ideal_height: 480,
        }
    }
}

/// A producer of video frames behind a `MediaStream`
pub trait FrameSource: Send {
    /// Current frame
    fn grab(&mut self) -> Result<DynamicImage, DeviceFault>;

    /// Whether the stream carries a video track at all
    fn has_video(&self) -> bool {
        true
    }

    /// Turn the hardware off
    fn release(&mut self) {}
}

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// A live camera stream
///
/// Clones share the same underlying track; `stop` on any clone ends it for
/// all of them.
#[derive(Clone)]
pub struct MediaStream {
    inner: Arc<StreamInner>,
}

struct StreamInner {
    id: u64,
    label: String,
    source: Mutex<Option<Box<dyn FrameSource>>>,
}

impl MediaStream {
    pub fn new(label: impl Into<String>, source: Box<dyn FrameSource>) -> Self {
        MediaStream {
            inner: Arc::new(StreamInner {
                id: NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed),
                label: label.into(),
                source: Mutex::new(Some(source)),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn is_live(&self) -> bool {
        self.source().is_some()
    }

    pub fn has_video(&self) -> bool {
        self.source().as_ref().is_some_and(|s| s.has_video())
    }

    pub fn grab_frame(&self) -> Result<DynamicImage, DeviceFault> {
        match self.source().as_mut() {
            Some(source) => source.grab(),
            None => Err(DeviceFault::named("InvalidStateError", "the camera stream has ended")),
        }
    }

    /// Stop the track; does nothing if it already ended
    pub fn stop(&self) {
        if let Some(mut source) = self.source().take() {
            source.release();
            debug!(stream = self.inner.id, "camera stream stopped");
        }
    }

    fn source(&self) -> MutexGuard<'_, Option<Box<dyn FrameSource>>> {
        // A panic while holding the lock leaves the Option intact
        self.inner.source.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("live", &self.is_live())
            .finish()
    }
}

/// Camera hardware port
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Ask for a video stream; may wait on a permission prompt
    async fn acquire(&self, constraints: VideoConstraints) -> Result<MediaStream, DeviceFault>;
}

/// Where the camera component is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraPhase {
    Closed,
    Opening,
    Ready,
    Failed(CameraError),
}

/// A pending camera open, to be run off the UI loop
pub struct OpenRequest {
    ticket: u64,
    device: Arc<dyn CameraDevice>,
    constraints: VideoConstraints,
}

impl OpenRequest {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub async fn run(self) -> OpenOutcome {
        let result = self
            .device
            .acquire(self.constraints)
            .await
            .map_err(|fault| {
                let error = CameraError::classify(&fault);
                debug!(%fault, ?error, "camera open failed");
                error
            });
        OpenOutcome {
            ticket: self.ticket,
            result,
        }
    }
}

impl fmt::Debug for OpenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenRequest")
            .field("ticket", &self.ticket)
            .field("constraints", &self.constraints)
            .finish()
    }
}

/// The result of running an `OpenRequest`
#[derive(Debug, Clone)]
pub struct OpenOutcome {
    ticket: u64,
    result: Result<MediaStream, CameraError>,
}

/// The selfie camera
pub struct CameraCapture {
    device: Arc<dyn CameraDevice>,
    constraints: VideoConstraints,
    session: Option<MediaStream>,
    phase: CameraPhase,
    ticket: u64,
}

impl CameraCapture {
    pub fn new(device: Arc<dyn CameraDevice>) -> Self {
        CameraCapture {
            device,
            constraints: VideoConstraints::default(),
            session: None,
            phase: CameraPhase::Closed,
            ticket: 0,
        }
    }

    pub fn phase(&self) -> &CameraPhase {
        &self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase == CameraPhase::Ready
    }

    /// Whether a live stream is currently held
    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(MediaStream::is_live)
    }

    /// Start opening the camera
    ///
    /// Any session already held is stopped first.
    pub fn begin_open(&mut self) -> OpenRequest {
        self.release_session();
        self.ticket += 1;
        self.phase = CameraPhase::Opening;
        info!(ticket = self.ticket, "requesting camera access");
        OpenRequest {
            ticket: self.ticket,
            device: Arc::clone(&self.device),
            constraints: self.constraints,
        }
    }

    /// Open again after a failure
    pub fn retry(&mut self) -> OpenRequest {
        self.begin_open()
    }

    /// Apply the result of an `OpenRequest`
    ///
    /// Returns `false` if the result was stale (the component was closed or
    /// reopened meanwhile); a stale stream is stopped immediately.
    pub fn finish_open(&mut self, outcome: OpenOutcome) -> bool {
        if self.phase != CameraPhase::Opening || outcome.ticket != self.ticket {
            if let Ok(stream) = &outcome.result {
                stream.stop();
            }
            debug!(ticket = outcome.ticket, current = self.ticket, "discarding stale camera open");
            return false;
        }

        match outcome.result {
            Ok(stream) if !stream.has_video() => {
                stream.stop();
                warn!("camera stream has no video track");
                self.phase = CameraPhase::Failed(CameraError::NoDevice);
            }
            Ok(stream) => {
                info!(stream = stream.id(), label = stream.label(), "camera ready");
                self.session = Some(stream);
                self.phase = CameraPhase::Ready;
            }
            Err(error) => {
                warn!(%error, "camera unavailable");
                self.phase = CameraPhase::Failed(error);
            }
        }
        true
    }

    /// Capture the current frame as a JPEG
    ///
    /// The stream keeps running so the user can retake.
    pub fn snapshot(&mut self) -> Result<ImageInput, SnapshotError> {
        let stream = match (&self.phase, &self.session) {
            (CameraPhase::Ready, Some(stream)) => stream,
            _ => return Err(SnapshotError::NotReady),
        };

        let frame = match stream.grab_frame() {
            Ok(frame) => frame,
            Err(fault) => {
                let error = CameraError::classify(&fault);
                warn!(%fault, "camera frame grab failed");
                self.fail(error.clone());
                return Err(error.into());
            }
        };

        let bytes = encode_jpeg(&frame).map_err(|e| CameraError::Unknown(e.to_string()))?;
        debug!(width = frame.width(), height = frame.height(), "took snapshot");
        Ok(ImageInput::snapshot(bytes))
    }

    /// Current frame for the live preview, if the camera is ready
    pub fn preview_frame(&self) -> Option<DynamicImage> {
        if !self.is_ready() {
            return None;
        }
        let stream = self.session.as_ref()?;
        match stream.grab_frame() {
            Ok(frame) => Some(frame),
            Err(fault) => {
                debug!(%fault, "no preview frame");
                None
            }
        }
    }

    /// Stop the camera; safe to call at any time
    ///
    /// Also invalidates an open that is still pending.
    pub fn close(&mut self) {
        let was_open = self.session.is_some() || self.phase == CameraPhase::Opening;
        self.release_session();
        self.ticket += 1;
        self.phase = CameraPhase::Closed;
        if was_open {
            info!("camera closed");
        }
    }

    fn fail(&mut self, error: CameraError) {
        self.release_session();
        self.phase = CameraPhase::Failed(error);
    }

    fn release_session(&mut self) {
        if let Some(stream) = self.session.take() {
            stream.stop();
        }
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        self.release_session();
    }
}

impl fmt::Debug for CameraCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraCapture")
            .field("phase", &self.phase)
            .field("session", &self.session)
            .field("ticket", &self.ticket)
            .finish()
    }
}

/// Synthetic camera producing an animated colour pattern
#[derive(Debug, Clone)]
pub struct TestPatternCamera {
    /// Simulated time to get through the permission prompt
    pub startup_delay: Duration,
}

impl Default for TestPatternCamera {
    fn default() -> Self {
        TestPatternCamera {
            startup_delay: Duration::from_millis(400),
        }
    }
}

#[async_trait]
impl CameraDevice for TestPatternCamera {
    async fn acquire(&self, constraints: VideoConstraints) -> Result<MediaStream, DeviceFault> {
        tokio::time::sleep(self.startup_delay).await;
        let pattern = TestPattern {
            width: constraints.ideal_width.max(1),
            height: constraints.ideal_height.max(1),
            frame: 0,
        };
        Ok(MediaStream::new("Test pattern camera", Box::new(pattern)))
    }
}

struct TestPattern {
    width: u32,
    height: u32,
    frame: u32,
}

impl FrameSource for TestPattern {
    fn grab(&mut self) -> Result<DynamicImage, DeviceFault> {
        self.frame = self.frame.wrapping_add(1);
        let shift = self.frame.wrapping_mul(4);
        let (w, h) = (self.width, self.height);
        let (cx, cy, r) = (w / 2, h / 2, w.min(h) / 4);

        let img = RgbImage::from_fn(w, h, |x, y| {
            let dx = x.abs_diff(cx);
            let dy = y.abs_diff(cy);
            if dx * dx + dy * dy <= r * r {
                // A face-sized disc in the middle of the frame
                Rgb([224, 172, 105])
            } else {
                Rgb([
                    ((x * 255 / w).wrapping_add(shift) % 256) as u8,
                    (y * 255 / h) as u8,
                    ((shift / 2) % 256) as u8,
                ])
            }
        });
        Ok(DynamicImage::ImageRgb8(img))
    }
}

/// A machine without a camera
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableCamera;

#[async_trait]
impl CameraDevice for UnavailableCamera {
    async fn acquire(&self, _constraints: VideoConstraints) -> Result<MediaStream, DeviceFault> {
        Err(DeviceFault::named("NotFoundError", "Requested device not found"))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    /// Scripted camera that counts live streams
    #[derive(Clone, Default)]
    pub(crate) struct FakeCamera {
        pub live: Arc<AtomicUsize>,
        pub opens: Arc<AtomicUsize>,
        script: Arc<Mutex<VecDeque<Result<(), DeviceFault>>>>,
    }

    impl FakeCamera {
        pub(crate) fn failing_once(fault: DeviceFault) -> Self {
            let camera = FakeCamera::default();
            camera.script.lock().unwrap().push_back(Err(fault));
            camera
        }

        pub(crate) fn live_streams(&self) -> usize {
            self.live.load(Ordering::SeqCst)
        }

        pub(crate) fn open_calls(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }
    }

    struct FakeSource {
        live: Arc<AtomicUsize>,
    }

    impl FrameSource for FakeSource {
        fn grab(&mut self) -> Result<DynamicImage, DeviceFault> {
            Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 48, Rgb([10, 20, 30]))))
        }

        fn release(&mut self) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl CameraDevice for FakeCamera {
        async fn acquire(&self, _constraints: VideoConstraints) -> Result<MediaStream, DeviceFault> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            if let Some(Err(fault)) = next {
                return Err(fault);
            }
            self.live.fetch_add(1, Ordering::SeqCst);
            Ok(MediaStream::new(
                "fake",
                Box::new(FakeSource { live: Arc::clone(&self.live) }),
            ))
        }
    }

    async fn open(camera: &mut CameraCapture) -> bool {
        let request = camera.begin_open();
        let outcome = request.run().await;
        camera.finish_open(outcome)
    }

    #[test]
    fn test_classify_platform_names() {
        let cases = [
            ("NotAllowedError", CameraError::PermissionDenied),
            ("PermissionDeniedError", CameraError::PermissionDenied),
            ("NotFoundError", CameraError::NoDevice),
            ("DevicesNotFoundError", CameraError::NoDevice),
            ("NotReadableError", CameraError::DeviceBusy),
            ("TrackStartError", CameraError::DeviceBusy),
            ("OverconstrainedError", CameraError::ConstraintsUnsupported),
            ("TypeError", CameraError::ConstraintsUnsupported),
            ("AbortError", CameraError::Aborted),
            ("SecurityError", CameraError::InsecureContext),
        ];
        for (name, expected) in cases {
            assert_eq!(CameraError::classify(&DeviceFault::named(name, "")), expected, "{name}");
        }
        assert_eq!(
            CameraError::classify(&DeviceFault::named("WeirdError", "boom")),
            CameraError::Unknown("boom".into())
        );
    }

    #[test]
    fn test_classify_io_errors() {
        let denied: DeviceFault = io::Error::from(io::ErrorKind::PermissionDenied).into();
        assert_eq!(CameraError::classify(&denied), CameraError::PermissionDenied);

        let missing: DeviceFault = io::Error::new(io::ErrorKind::NotFound, "/dev/video0").into();
        assert_eq!(CameraError::classify(&missing), CameraError::NoDevice);
    }

    #[test]
    fn test_error_messages_are_distinct() {
        let errors = [
            CameraError::PermissionDenied,
            CameraError::NoDevice,
            CameraError::DeviceBusy,
            CameraError::ConstraintsUnsupported,
            CameraError::Aborted,
            CameraError::InsecureContext,
            CameraError::Unknown("x".into()),
        ];
        let mut messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), errors.len());
    }

    #[tokio::test]
    async fn test_open_snapshot_close() {
        let device = FakeCamera::default();
        let mut camera = CameraCapture::new(Arc::new(device.clone()));

        assert!(open(&mut camera).await);
        assert!(camera.is_ready());
        assert_eq!(device.live_streams(), 1);

        let first = camera.snapshot().unwrap();
        // Snapshot leaves the stream running for a retake
        assert!(camera.is_active());
        let second = camera.snapshot().unwrap();
        assert!(!first.bytes.is_empty() && !second.bytes.is_empty());

        camera.close();
        assert_eq!(device.live_streams(), 0);
        assert_eq!(camera.phase(), &CameraPhase::Closed);

        // close is idempotent
        camera.close();
        assert_eq!(device.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_reopen_never_holds_two_streams() {
        let device = FakeCamera::default();
        let mut camera = CameraCapture::new(Arc::new(device.clone()));

        for _ in 0..3 {
            assert!(open(&mut camera).await);
            assert_eq!(device.live_streams(), 1);
        }
        camera.close();
        open(&mut camera).await;
        camera.close();
        camera.close();
        assert_eq!(device.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_close_while_opening_stops_late_stream() {
        let device = FakeCamera::default();
        let mut camera = CameraCapture::new(Arc::new(device.clone()));

        let request = camera.begin_open();
        camera.close();
        let outcome = request.run().await;
        // The device handed out a stream, but nobody wants it any more
        assert!(!camera.finish_open(outcome));
        assert_eq!(device.live_streams(), 0);
        assert!(!camera.is_active());
        assert_eq!(camera.phase(), &CameraPhase::Closed);
    }

    #[tokio::test]
    async fn test_superseded_open_is_discarded() {
        let device = FakeCamera::default();
        let mut camera = CameraCapture::new(Arc::new(device.clone()));

        let first = camera.begin_open();
        let second = camera.begin_open();
        let (a, b) = (first.run().await, second.run().await);

        assert!(camera.finish_open(b));
        assert!(!camera.finish_open(a));
        assert_eq!(device.live_streams(), 1);
    }

    #[tokio::test]
    async fn test_failure_then_retry() {
        let device = FakeCamera::failing_once(DeviceFault::named("NotFoundError", "no camera"));
        let mut camera = CameraCapture::new(Arc::new(device.clone()));

        open(&mut camera).await;
        assert_eq!(camera.phase(), &CameraPhase::Failed(CameraError::NoDevice));
        assert_eq!(camera.snapshot(), Err(SnapshotError::NotReady));

        let outcome = camera.retry().run().await;
        assert!(camera.finish_open(outcome));
        assert!(camera.is_ready());
        assert_eq!(device.open_calls(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_camera_reports_no_device() {
        let mut camera = CameraCapture::new(Arc::new(UnavailableCamera));
        open(&mut camera).await;
        assert_eq!(camera.phase(), &CameraPhase::Failed(CameraError::NoDevice));
    }

    #[tokio::test]
    async fn test_pattern_camera_serves_frames() {
        let device = TestPatternCamera { startup_delay: Duration::ZERO };
        let mut camera = CameraCapture::new(Arc::new(device));
        open(&mut camera).await;

        let frame = camera.preview_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (640, 480));
        assert!(camera.snapshot().is_ok());
    }

    #[test]
    fn test_dropping_component_stops_stream() {
        let live = Arc::new(AtomicUsize::new(1));
        let stream = MediaStream::new("fake", Box::new(FakeSource { live: Arc::clone(&live) }));
        let mut camera = CameraCapture::new(Arc::new(UnavailableCamera));
        camera.session = Some(stream.clone());
        camera.phase = CameraPhase::Ready;

        drop(camera);
        assert!(!stream.is_live());
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }
}
