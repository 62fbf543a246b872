use iced::widget::image::Handle;
use iced::widget::{button, center, column, container, opaque, row, scrollable, stack, text, text_input};
use iced::{event, time, window, Alignment, Color, Element, Event as IcedEvent, Length, Subscription, Task, Theme};
use rfd::AsyncFileDialog;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

mod capture;
mod config;
mod error;
mod logging;
mod state;
mod ui;

use capture::camera::{CameraCapture, CameraDevice, OpenOutcome, TestPatternCamera, UnavailableCamera};
use capture::flow::{CaptureFlow, CapturePhase, Modality, ModalityRequest, RecognitionOutcome, UploadTicket};
use capture::recognition::{MockRecognizer, RecognitionResult};
use capture::still::{self, DecodeError, ImageInput, ImageRules, ACCEPTED_EXTENSIONS};
use config::{AppConfig, CameraBackend};
use state::catalog::Catalog;
use state::data::{EventId, Photo, PhotoId};
use state::selection::{CheckoutSummary, SelectionSet};
use state::theme::ThemeContext;

const PREVIEW_INTERVAL: Duration = Duration::from_millis(100);

/// Which page is showing behind the capture dialog
#[derive(Debug, Clone)]
enum View {
    Events,
    Event(EventId),
    TextResults { query: String, photos: Vec<Photo> },
    FaceResults(RecognitionResult),
    Checkout,
}

/// Main application state
struct SportShot {
    config: AppConfig,
    catalog: Arc<Catalog>,
    theme: ThemeContext,
    flow: CaptureFlow,
    /// Cart shared by every page; survives new searches
    selection: SelectionSet,
    view: View,
    query: String,
    capture_open: bool,
    /// Photo shown in the detail card
    detail: Option<PhotoId>,
    /// Confirm-screen preview, uploaded once per image
    preview: Option<Handle>,
    /// Latest live camera frame
    live_frame: Option<Handle>,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    QueryChanged(String),
    SearchSubmitted,
    GoHome,
    OpenEvent(EventId),

    /// Open the find-my-photos dialog
    OpenCapture,
    /// Dialog dismissed; tears down the camera and any pending search
    CloseCapture,
    ModalitySelected(Modality),
    /// File chooser or dropped file finished; `None` when cancelled
    UploadRead(UploadTicket, Option<Result<ImageInput, DecodeError>>),
    FileDropped(PathBuf),
    CameraOpened(OpenOutcome),
    RetryCamera,
    PreviewTick,
    TakeSnapshot,
    DiscardImage,
    ConfirmImage,
    RecognitionFinished(RecognitionOutcome),
    RetryCapture,

    TogglePhoto(Photo),
    ShowPhoto(PhotoId),
    ClosePhoto,
    ClearSelection,
    OpenCheckout,
    ToggleTheme,
}

impl SportShot {
    fn new() -> (Self, Task<Message>) {
        let config = AppConfig::load_or_default();
        let theme = match config::config_dir() {
            Ok(dir) => ThemeContext::load(Some(dir.join("theme.json"))),
            Err(e) => {
                warn!(error = %e, "theme preference will not be saved");
                ThemeContext::in_memory(true)
            }
        };

        (SportShot::with_settings(config, theme), Task::none())
    }

    fn with_settings(config: AppConfig, theme: ThemeContext) -> Self {
        let catalog = Arc::new(Catalog::mock(config.catalog_size));
        let device: Arc<dyn CameraDevice> = match config.camera {
            CameraBackend::TestPattern => Arc::new(TestPatternCamera::default()),
            CameraBackend::Unavailable => Arc::new(UnavailableCamera),
        };
        let mut recognizer = MockRecognizer::new(
            catalog.clone(),
            config.recognition_delay(),
            config.recognition_timeout(),
        );
        if config.simulate_recognition_failure {
            recognizer = recognizer.failing();
        }
        let rules = ImageRules {
            max_bytes: config.max_upload_bytes,
            preview_size: config.preview_size,
        };
        let flow = CaptureFlow::new(CameraCapture::new(device), Arc::new(recognizer), rules);

        info!(
            events = catalog.events().len(),
            photos = catalog.photos().len(),
            camera = ?config.camera,
            "SportShot initialized"
        );

        SportShot {
            config,
            catalog,
            theme,
            flow,
            selection: SelectionSet::new(),
            view: View::Events,
            query: String::new(),
            capture_open: false,
            detail: None,
            preview: None,
            live_frame: None,
        }
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::QueryChanged(query) => {
                self.query = query;
            }
            Message::SearchSubmitted => {
                let query = self.query.trim().to_string();
                if query.is_empty() {
                    return Task::none();
                }
                let photos = self.catalog.search(&query);
                info!(%query, hits = photos.len(), "text search");
                self.view = View::TextResults { query, photos };
            }
            Message::GoHome => {
                self.view = View::Events;
            }
            Message::OpenEvent(id) => {
                self.view = View::Event(id);
            }

            Message::OpenCapture => {
                self.flow.reset();
                self.sync_images();
                self.capture_open = true;
            }
            Message::CloseCapture => {
                self.flow.reset();
                self.sync_images();
                self.capture_open = false;
            }
            Message::ModalitySelected(modality) => match self.flow.select_modality(modality) {
                Some(ModalityRequest::PickFile(ticket)) => {
                    return Task::perform(pick_upload(self.config.max_upload_bytes), move |read| {
                        Message::UploadRead(ticket, read)
                    });
                }
                Some(ModalityRequest::OpenCamera(request)) => {
                    debug!(ticket = request.ticket(), "opening camera");
                    return Task::perform(request.run(), Message::CameraOpened);
                }
                None => {}
            },
            Message::UploadRead(..) if !self.capture_open => {
                debug!("dialog closed before the upload arrived");
            }
            Message::UploadRead(ticket, read) => {
                if self.flow.upload_read(ticket, read) {
                    self.sync_images();
                }
            }
            Message::FileDropped(path) => {
                let accepts = matches!(self.flow.phase(), CapturePhase::Idle | CapturePhase::AwaitingUpload);
                if !self.capture_open || !accepts {
                    debug!(path = %path.display(), "ignoring dropped file");
                    return Task::none();
                }
                let ticket = self.flow.upload_ticket();
                return Task::perform(still::read_upload(path, self.config.max_upload_bytes), move |read| {
                    Message::UploadRead(ticket, Some(read))
                });
            }
            Message::CameraOpened(outcome) => {
                self.flow.camera_opened(outcome);
                self.refresh_live_frame();
            }
            Message::RetryCamera => {
                if let Some(request) = self.flow.retry_camera() {
                    debug!(ticket = request.ticket(), "retrying camera");
                    return Task::perform(request.run(), Message::CameraOpened);
                }
            }
            Message::PreviewTick => {
                self.refresh_live_frame();
            }
            Message::TakeSnapshot => {
                self.flow.take_snapshot();
                self.sync_images();
            }
            Message::DiscardImage => {
                self.flow.discard_image();
                self.sync_images();
            }
            Message::ConfirmImage => {
                if let Some(submission) = self.flow.confirm() {
                    debug!(ticket = submission.ticket(), "submitting image for recognition");
                    self.sync_images();
                    return Task::perform(submission.run(), Message::RecognitionFinished);
                }
            }
            Message::RecognitionFinished(outcome) => {
                if self.flow.recognition_finished(outcome) {
                    if let Some(result) = self.flow.results() {
                        self.view = View::FaceResults(result.clone());
                        self.capture_open = false;
                    }
                }
            }
            Message::RetryCapture => {
                self.flow.retry();
                self.sync_images();
            }

            Message::TogglePhoto(photo) => {
                let added = self.selection.toggle(&photo);
                debug!(photo = %photo.id, added, total = %self.selection.total(), "selection changed");
            }
            Message::ShowPhoto(id) => {
                self.detail = Some(id);
            }
            Message::ClosePhoto => {
                self.detail = None;
            }
            Message::ClearSelection => {
                self.selection.clear();
            }
            Message::OpenCheckout => {
                self.detail = None;
                self.view = View::Checkout;
            }
            Message::ToggleTheme => {
                if let Err(e) = self.theme.toggle() {
                    warn!(error = %e, "could not save theme preference");
                }
            }
        }

        Task::none()
    }

    /// Re-upload the preview after any flow change that may replace it
    fn sync_images(&mut self) {
        self.preview = self.flow.preview().map(ui::preview_handle);
        if !self.flow.camera().is_active() {
            self.live_frame = None;
        }
    }

    fn refresh_live_frame(&mut self) {
        self.live_frame = self.flow.camera().preview_frame().as_ref().map(ui::frame_handle);
    }

    fn view(&self) -> Element<Message> {
        let page: Element<Message> = match &self.view {
            View::Events => self.events_page(),
            View::Event(id) => self.event_page(id),
            View::TextResults { query, photos } => column![
                text(format!("Results for \"{query}\" ({} photos)", photos.len())).size(22),
                ui::photo_grid::view(photos, &self.catalog, &self.selection),
            ]
            .spacing(16)
            .into(),
            View::FaceResults(result) => column![
                row![
                    text(if result.is_empty() {
                        "We couldn't find any photos of you".to_string()
                    } else {
                        format!("We found {} photos of you", result.len())
                    })
                        .size(22)
                        .width(Length::Fill),
                    button(text("New search")).on_press(Message::OpenCapture),
                ]
                .align_y(Alignment::Center),
                ui::photo_grid::view(result.photos(), &self.catalog, &self.selection),
            ]
            .spacing(16)
            .into(),
            View::Checkout => ui::cart::checkout(&CheckoutSummary::from(&self.selection)),
        };

        let mut base = column![self.header(), scrollable(container(page).padding(24)).height(Length::Fill)];
        if let Some(bar) = ui::cart::bar(&self.selection) {
            base = base.push(bar);
        }
        let base: Element<Message> = base.into();

        if self.capture_open {
            let dialog = ui::capture_modal::view(
                &self.flow,
                self.preview.as_ref(),
                self.live_frame.as_ref(),
                self.config.max_upload_bytes,
            );
            return stack![base, overlay(dialog)].into();
        }

        match self.detail.as_ref().and_then(|id| self.catalog.photo(id)) {
            Some(photo) => {
                let card = ui::photo_grid::detail(photo, &self.catalog, self.selection.contains(&photo.id));
                stack![base, overlay(card)].into()
            }
            None => base,
        }
    }

    fn header(&self) -> Element<Message> {
        let theme_label = if self.theme.is_dark() { "Light mode" } else { "Dark mode" };

        container(
            row![
                button(text("SportShot").size(26)).on_press(Message::GoHome),
                text_input("Search by event, place or sport", &self.query)
                    .on_input(Message::QueryChanged)
                    .on_submit(Message::SearchSubmitted)
                    .padding(8)
                    .width(Length::Fill),
                button(text("Search")).on_press(Message::SearchSubmitted),
                button(text("Find my photos")).on_press(Message::OpenCapture),
                button(text(theme_label)).on_press(Message::ToggleTheme),
            ]
            .spacing(12)
            .align_y(Alignment::Center),
        )
        .padding(16)
        .into()
    }

    fn events_page(&self) -> Element<Message> {
        let cards = self.catalog.events().iter().fold(column![].spacing(12), |col, event| {
            col.push(
                button(
                    column![
                        text(event.name.clone()).size(20),
                        text(format!(
                            "{} · {} · {}",
                            event.date.format("%B %-d, %Y"),
                            event.location,
                            event.category
                        ))
                        .size(14),
                        text(format!("{} photos", event.total_photos)).size(13),
                    ]
                    .spacing(4),
                )
                .width(Length::Fill)
                .padding(14)
                .on_press(Message::OpenEvent(event.id.clone())),
            )
        });

        column![text("Recent events").size(26), cards].spacing(16).into()
    }

    fn event_page(&self, id: &EventId) -> Element<Message> {
        let Some(event) = self.catalog.event(id) else {
            return column![
                text("This event no longer exists.").size(18),
                button(text("Back to events")).on_press(Message::GoHome),
            ]
            .spacing(12)
            .into();
        };
        let photos = self.catalog.photos_for_event(id);

        column![
            row![
                text(event.name.clone()).size(26).width(Length::Fill),
                button(text("Back to events")).on_press(Message::GoHome),
            ]
            .align_y(Alignment::Center),
            text(format!("{} · {}", event.date.format("%B %-d, %Y"), event.location)).size(14),
            ui::photo_grid::view(&photos, &self.catalog, &self.selection),
        ]
        .spacing(12)
        .into()
    }

    fn theme(&self) -> Theme {
        self.theme.iced_theme()
    }

    fn subscription(&self) -> Subscription<Message> {
        let drops = event::listen_with(|event, _status, _window| match event {
            IcedEvent::Window(window::Event::FileDropped(path)) => Some(Message::FileDropped(path)),
            _ => None,
        });

        let live = self.capture_open
            && self.flow.phase() == CapturePhase::AwaitingSelfie
            && self.flow.camera().is_ready();
        if live {
            Subscription::batch([drops, time::every(PREVIEW_INTERVAL).map(|_| Message::PreviewTick)])
        } else {
            drops
        }
    }
}

/// Dim the page and center `content` above it
fn overlay<'a>(content: Element<'a, Message>) -> Element<'a, Message> {
    opaque(
        center(content).style(|_theme| container::Style {
            background: Some(
                Color {
                    a: 0.7,
                    ..Color::BLACK
                }
                .into(),
            ),
            ..container::Style::default()
        }),
    )
}

/// Ask for an image file and read it
async fn pick_upload(max_bytes: u64) -> Option<Result<ImageInput, DecodeError>> {
    let handle = AsyncFileDialog::new()
        .set_title("Choose a photo of your face")
        .add_filter("Images", &ACCEPTED_EXTENSIONS)
        .pick_file()
        .await?;
    Some(still::read_upload(handle.path().to_path_buf(), max_bytes).await)
}

fn main() -> iced::Result {
    logging::init();

    iced::application("SportShot", SportShot::update, SportShot::view)
        .theme(SportShot::theme)
        .subscription(SportShot::subscription)
        .window_size((1200.0, 820.0))
        .centered()
        .run_with(SportShot::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::still::tests::encoded;
    use ::image::ImageFormat;

    fn app() -> SportShot {
        let config = AppConfig {
            recognition_delay_ms: 0,
            ..AppConfig::default()
        };
        SportShot::with_settings(config, ThemeContext::in_memory(true))
    }

    fn upload() -> ImageInput {
        ImageInput::upload("me.png", encoded(64, 48, ImageFormat::Png))
    }

    /// A finished file read tagged with the current dialog session
    fn read_now(app: &SportShot) -> Message {
        Message::UploadRead(app.flow.upload_ticket(), Some(Ok(upload())))
    }

    /// Drive an upload through to a pending recognition call
    fn submit(app: &mut SportShot) -> capture::flow::Submission {
        let _ = app.update(Message::OpenCapture);
        let read = read_now(app);
        let _ = app.update(read);
        assert!(app.preview.is_some());
        app.flow.confirm().unwrap()
    }

    #[test]
    fn test_starts_on_events_page() {
        let app = app();
        assert!(matches!(app.view, View::Events));
        assert!(!app.capture_open);
        assert!(app.selection.is_empty());
    }

    #[test]
    fn test_text_search_shows_results() {
        let mut app = app();
        let _ = app.update(Message::QueryChanged("  marathon ".into()));
        let _ = app.update(Message::SearchSubmitted);

        match &app.view {
            View::TextResults { query, photos } => {
                assert_eq!(query, "marathon");
                assert!(!photos.is_empty());
            }
            other => panic!("expected text results, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_search_keeps_page() {
        let mut app = app();
        let _ = app.update(Message::QueryChanged("   ".into()));
        let _ = app.update(Message::SearchSubmitted);
        assert!(matches!(app.view, View::Events));
    }

    #[test]
    fn test_toggle_and_clear_selection() {
        let mut app = app();
        let photo = app.catalog.photos()[0].clone();

        let _ = app.update(Message::TogglePhoto(photo.clone()));
        assert!(app.selection.contains(&photo.id));
        let _ = app.update(Message::TogglePhoto(photo.clone()));
        assert!(app.selection.is_empty());

        let _ = app.update(Message::TogglePhoto(photo));
        let _ = app.update(Message::ClearSelection);
        assert!(app.selection.is_empty());
    }

    #[test]
    fn test_toggle_theme() {
        let mut app = app();
        assert_eq!(app.theme(), Theme::Dark);
        let _ = app.update(Message::ToggleTheme);
        assert_eq!(app.theme(), Theme::Light);
    }

    #[test]
    fn test_dropped_file_ignored_while_dialog_closed() {
        let mut app = app();
        let _ = app.update(Message::FileDropped(PathBuf::from("/tmp/face.jpg")));
        let read = read_now(&app);
        let _ = app.update(read);
        assert_eq!(app.flow.phase(), CapturePhase::Idle);
        assert!(app.preview.is_none());
    }

    #[test]
    fn test_discarding_upload_drops_preview() {
        let mut app = app();
        let _ = app.update(Message::OpenCapture);
        let read = read_now(&app);
        let _ = app.update(read);
        assert_eq!(app.flow.phase(), CapturePhase::ImageReady);

        let _ = app.update(Message::DiscardImage);
        assert_eq!(app.flow.phase(), CapturePhase::Idle);
        assert!(app.preview.is_none());
    }

    #[tokio::test]
    async fn test_recognition_results_replace_page_and_close_dialog() {
        let mut app = app();
        let submission = submit(&mut app);

        let _ = app.update(Message::RecognitionFinished(submission.run().await));
        assert!(!app.capture_open);
        match &app.view {
            View::FaceResults(result) => assert!(!result.is_empty()),
            other => panic!("expected face results, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_matches_is_an_empty_results_page() {
        let config = AppConfig {
            recognition_delay_ms: 0,
            catalog_size: 0,
            ..AppConfig::default()
        };
        let mut app = SportShot::with_settings(config, ThemeContext::in_memory(true));
        let submission = submit(&mut app);

        let _ = app.update(Message::RecognitionFinished(submission.run().await));
        match &app.view {
            View::FaceResults(result) => assert!(result.is_empty()),
            other => panic!("expected face results, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_closing_dialog_discards_late_results() {
        let mut app = app();
        let submission = submit(&mut app);

        let _ = app.update(Message::CloseCapture);
        let _ = app.update(Message::RecognitionFinished(submission.run().await));
        assert!(matches!(app.view, View::Events));
        assert_eq!(app.flow.phase(), CapturePhase::Idle);
    }

    #[test]
    fn test_chooser_result_does_not_leak_into_reopened_dialog() {
        let mut app = app();
        let _ = app.update(Message::OpenCapture);
        let _ = app.update(Message::ModalitySelected(Modality::Upload));
        let stale = app.flow.upload_ticket();

        let _ = app.update(Message::CloseCapture);
        let _ = app.update(Message::OpenCapture);
        let _ = app.update(Message::UploadRead(stale, Some(Ok(upload()))));
        assert_eq!(app.flow.phase(), CapturePhase::Idle);
        assert!(app.preview.is_none());

        let _ = app.update(Message::UploadRead(stale, Some(Err(DecodeError::Unreadable("gone".into())))));
        assert_eq!(app.flow.phase(), CapturePhase::Idle);
    }

    #[tokio::test]
    async fn test_selection_survives_new_search() {
        let mut app = app();
        let submission = submit(&mut app);
        let _ = app.update(Message::RecognitionFinished(submission.run().await));

        let first = match &app.view {
            View::FaceResults(result) => result.photos()[0].clone(),
            other => panic!("expected face results, got {other:?}"),
        };
        let _ = app.update(Message::TogglePhoto(first.clone()));

        let submission = submit(&mut app);
        let _ = app.update(Message::RecognitionFinished(submission.run().await));
        assert!(app.selection.contains(&first.id));
        assert_eq!(app.selection.len(), 1);
    }
}
