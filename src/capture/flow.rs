//! Find-my-photos capture flow
//!
//! Walks the user from choosing upload or selfie, through getting and
//! confirming an image, to the recognition results. The UI renders
//! `CaptureFlow::state()` and forwards user actions and background results
//! to the methods below; anything asynchronous is handed back as a request
//! object for the caller to run.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::camera::{CameraCapture, OpenOutcome, OpenRequest, SnapshotError};
use super::recognition::{RecognitionError, RecognitionResult, Recognizer};
use super::still::{self, CapturedImage, DecodeError, ImageInput, ImageRules, ImageSource, Preview};

/// How the user wants to provide their face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Upload,
    Selfie,
}

/// Tags a file read with the dialog session it was started in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTicket(u64);

/// What the caller must do after a modality is picked
#[derive(Debug)]
pub enum ModalityRequest {
    /// Show the file chooser; hand the result to `upload_read` with this ticket
    PickFile(UploadTicket),
    /// Run the camera open in the background
    OpenCamera(OpenRequest),
}

/// Why the flow ended in `Failed`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Recognition(#[from] RecognitionError),
}

/// Where the user is in the flow
#[derive(Debug)]
pub enum CaptureState {
    Idle,
    AwaitingUpload,
    AwaitingSelfie,
    /// Image decoded, waiting for the user to confirm
    ImageReady(CapturedImage),
    Submitting { ticket: u64 },
    Results(RecognitionResult),
    Failed(FlowError),
}

/// State discriminant, handy for views and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Idle,
    AwaitingUpload,
    AwaitingSelfie,
    ImageReady,
    Submitting,
    Results,
    Failed,
}

impl CaptureState {
    pub fn phase(&self) -> CapturePhase {
        match self {
            CaptureState::Idle => CapturePhase::Idle,
            CaptureState::AwaitingUpload => CapturePhase::AwaitingUpload,
            CaptureState::AwaitingSelfie => CapturePhase::AwaitingSelfie,
            CaptureState::ImageReady(_) => CapturePhase::ImageReady,
            CaptureState::Submitting { .. } => CapturePhase::Submitting,
            CaptureState::Results(_) => CapturePhase::Results,
            CaptureState::Failed(_) => CapturePhase::Failed,
        }
    }
}

/// An image on its way to the recognizer
pub struct Submission {
    ticket: u64,
    recognizer: Arc<dyn Recognizer>,
    image: CapturedImage,
}

impl Submission {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub async fn run(self) -> RecognitionOutcome {
        let result = self.recognizer.recognize(self.image).await;
        RecognitionOutcome {
            ticket: self.ticket,
            result,
        }
    }
}

impl fmt::Debug for Submission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Submission")
            .field("ticket", &self.ticket)
            .field("image", &self.image)
            .finish()
    }
}

/// What a finished `Submission` reports back
#[derive(Debug, Clone)]
pub struct RecognitionOutcome {
    ticket: u64,
    result: Result<RecognitionResult, RecognitionError>,
}

/// The capture flow state machine
pub struct CaptureFlow {
    state: CaptureState,
    camera: CameraCapture,
    recognizer: Arc<dyn Recognizer>,
    rules: ImageRules,
    preview: Option<Preview>,
    ticket: u64,
    /// Bumped on every reset so file reads from an earlier session are dropped
    session: u64,
}

impl CaptureFlow {
    pub fn new(camera: CameraCapture, recognizer: Arc<dyn Recognizer>, rules: ImageRules) -> Self {
        CaptureFlow {
            state: CaptureState::Idle,
            camera,
            recognizer,
            rules,
            preview: None,
            ticket: 0,
            session: 0,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn phase(&self) -> CapturePhase {
        self.state.phase()
    }

    pub fn camera(&self) -> &CameraCapture {
        &self.camera
    }

    /// Preview of the image waiting for confirmation
    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    /// Source of the image waiting for confirmation
    pub fn pending_source(&self) -> Option<ImageSource> {
        match &self.state {
            CaptureState::ImageReady(image) => Some(image.source()),
            _ => None,
        }
    }

    pub fn results(&self) -> Option<&RecognitionResult> {
        match &self.state {
            CaptureState::Results(result) => Some(result),
            _ => None,
        }
    }

    /// Pick upload or selfie; ignored unless idle
    pub fn select_modality(&mut self, modality: Modality) -> Option<ModalityRequest> {
        if self.phase() != CapturePhase::Idle {
            debug!(?modality, phase = ?self.phase(), "ignoring modality selection");
            return None;
        }

        info!(?modality, "modality selected");
        match modality {
            Modality::Upload => {
                self.state = CaptureState::AwaitingUpload;
                Some(ModalityRequest::PickFile(self.upload_ticket()))
            }
            Modality::Selfie => {
                self.state = CaptureState::AwaitingSelfie;
                Some(ModalityRequest::OpenCamera(self.camera.begin_open()))
            }
        }
    }

    /// Ticket for a file read started now (chooser or drag and drop)
    pub fn upload_ticket(&self) -> UploadTicket {
        UploadTicket(self.session)
    }

    /// Apply a finished file read; `None` means the chooser was dismissed
    ///
    /// Reads started before the last reset are dropped. Returns whether the
    /// read was applied.
    pub fn upload_read(&mut self, ticket: UploadTicket, read: Option<Result<ImageInput, DecodeError>>) -> bool {
        if ticket != self.upload_ticket() {
            debug!(?ticket, session = self.session, "dropping file read from a closed session");
            return false;
        }
        match read {
            None => self.upload_cancelled(),
            Some(Ok(input)) => return self.provide_image(input),
            Some(Err(error)) => self.upload_failed(error),
        }
        true
    }

    /// The file chooser was dismissed without a file
    pub fn upload_cancelled(&mut self) {
        if self.phase() == CapturePhase::AwaitingUpload {
            self.state = CaptureState::Idle;
        }
    }

    /// The chosen or dropped file could not be read
    pub fn upload_failed(&mut self, error: DecodeError) {
        if !matches!(self.phase(), CapturePhase::Idle | CapturePhase::AwaitingUpload) {
            return;
        }
        warn!(%error, "upload unreadable");
        self.preview = None;
        self.state = CaptureState::Failed(error.into());
    }

    /// Hand over an uploaded file or a camera snapshot
    ///
    /// Uploads are accepted while idle (drag and drop) or waiting for the
    /// file chooser; snapshots only while the selfie camera is up. Returns
    /// whether the input was taken.
    pub fn provide_image(&mut self, input: ImageInput) -> bool {
        let accepted = match input.source {
            ImageSource::Upload => {
                matches!(self.phase(), CapturePhase::Idle | CapturePhase::AwaitingUpload)
            }
            ImageSource::Selfie => self.phase() == CapturePhase::AwaitingSelfie,
        };
        if !accepted {
            debug!(source = %input.source, phase = ?self.phase(), "ignoring image");
            return false;
        }

        match still::decode(input, &self.rules) {
            Ok((image, preview)) => {
                let (width, height) = image.dimensions();
                info!(source = %image.source(), format = ?image.format(), width, height, "image ready");
                self.preview = Some(preview);
                self.state = CaptureState::ImageReady(image);
            }
            Err(error) => {
                warn!(%error, "image rejected");
                self.camera.close();
                self.preview = None;
                self.state = CaptureState::Failed(error.into());
            }
        }
        true
    }

    /// Apply the result of the camera open started by `select_modality`
    pub fn camera_opened(&mut self, outcome: OpenOutcome) {
        // A late open after the user moved on is stopped by the camera itself
        self.camera.finish_open(outcome);
    }

    /// Try the camera again after an acquisition error
    pub fn retry_camera(&mut self) -> Option<OpenRequest> {
        if self.phase() != CapturePhase::AwaitingSelfie || self.camera.is_ready() {
            return None;
        }
        Some(self.camera.retry())
    }

    /// Take the selfie from the live camera
    pub fn take_snapshot(&mut self) -> bool {
        if self.phase() != CapturePhase::AwaitingSelfie {
            return false;
        }
        match self.camera.snapshot() {
            Ok(input) => self.provide_image(input),
            Err(SnapshotError::NotReady) => false,
            // The camera moved to its failed phase and offers a retry
            Err(SnapshotError::Camera(_)) => false,
        }
    }

    /// Throw away the pending image ("choose another" / "retake")
    ///
    /// Uploads go back to idle. Selfies go back to the live camera, which
    /// stayed open.
    pub fn discard_image(&mut self) {
        let source = match self.pending_source() {
            Some(source) => source,
            None => return,
        };
        self.preview = None;
        self.state = match source {
            ImageSource::Upload => CaptureState::Idle,
            ImageSource::Selfie if self.camera.is_ready() => CaptureState::AwaitingSelfie,
            ImageSource::Selfie => {
                self.camera.close();
                CaptureState::Idle
            }
        };
        debug!(phase = ?self.phase(), "image discarded");
    }

    /// Send the pending image to recognition
    ///
    /// Only valid with an image ready. Every other state, including a
    /// submission already in flight, yields `None`.
    pub fn confirm(&mut self) -> Option<Submission> {
        let ticket = self.ticket + 1;
        let image = match std::mem::replace(&mut self.state, CaptureState::Submitting { ticket }) {
            CaptureState::ImageReady(image) => image,
            other => {
                debug!(phase = ?other.phase(), "ignoring confirm");
                self.state = other;
                return None;
            }
        };
        self.ticket = ticket;
        // Done with the camera and the preview once the image is on its way
        self.camera.close();
        self.preview = None;

        info!(ticket, source = %image.source(), "submitting image for recognition");
        Some(Submission {
            ticket,
            recognizer: Arc::clone(&self.recognizer),
            image,
        })
    }

    /// Apply a finished recognition call
    ///
    /// Results for anything but the current submission are dropped.
    /// Returns whether the outcome was applied.
    pub fn recognition_finished(&mut self, outcome: RecognitionOutcome) -> bool {
        match self.state {
            CaptureState::Submitting { ticket } if ticket == outcome.ticket => {}
            _ => {
                debug!(ticket = outcome.ticket, "discarding stale recognition result");
                return false;
            }
        }

        self.state = match outcome.result {
            Ok(result) => {
                info!(matches = result.len(), "showing recognition results");
                CaptureState::Results(result)
            }
            Err(error) => {
                warn!(reason = error.reason(), "recognition failed");
                CaptureState::Failed(error.into())
            }
        };
        true
    }

    /// Back to idle from anywhere
    ///
    /// Stops the camera, drops the preview and orphans any recognition call
    /// still in flight.
    pub fn reset(&mut self) {
        self.camera.close();
        self.preview = None;
        self.ticket += 1;
        self.session += 1;
        if self.phase() != CapturePhase::Idle {
            debug!(from = ?self.phase(), "capture flow reset");
        }
        self.state = CaptureState::Idle;
    }

    /// Start over after a failure
    pub fn retry(&mut self) {
        self.reset();
    }
}

impl fmt::Debug for CaptureFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureFlow")
            .field("state", &self.state)
            .field("camera", &self.camera)
            .field("preview", &self.preview)
            .field("ticket", &self.ticket)
            .finish()
    }
}
