//! The find-my-photos dialog
//!
//! One screen per capture phase. The dialog never changes state itself; all
//! buttons map to flow operations in `SportShot::update`.

use iced::widget::image::Handle;
use iced::widget::{button, column, container, row, text, Space};
use iced::{Alignment, Element, Length};

use crate::capture::camera::CameraPhase;
use crate::capture::flow::{CaptureFlow, CaptureState, Modality};
use crate::capture::still::{self, ImageSource};
use crate::Message;

const DIALOG_WIDTH: f32 = 520.0;
const IMAGE_HEIGHT: f32 = 300.0;

pub fn view<'a>(
    flow: &'a CaptureFlow,
    preview: Option<&Handle>,
    live_frame: Option<&Handle>,
    max_upload_bytes: u64,
) -> Element<'a, Message> {
    let body: Element<'a, Message> = match flow.state() {
        CaptureState::Idle => choose_modality(max_upload_bytes),
        CaptureState::AwaitingUpload => waiting("Waiting for a file to be chosen..."),
        CaptureState::AwaitingSelfie => selfie(flow.camera().phase(), live_frame),
        CaptureState::ImageReady(image) => confirm(image.source(), preview),
        CaptureState::Submitting { .. } => waiting("Processing facial recognition..."),
        CaptureState::Results(result) => waiting(&format!("Found {} photos.", result.len())),
        CaptureState::Failed(error) => column![
            text(error.to_string()).size(16),
            button(text("Try again")).on_press(Message::RetryCapture),
        ]
        .spacing(16)
        .into(),
    };

    let header = row![
        text("Find my photos").size(24).width(Length::Fill),
        button(text("✕")).on_press(Message::CloseCapture),
    ]
    .align_y(Alignment::Center);

    container(column![header, body].spacing(20))
        .width(Length::Fixed(DIALOG_WIDTH))
        .padding(24)
        .style(container::rounded_box)
        .into()
}

fn choose_modality<'a>(max_upload_bytes: u64) -> Element<'a, Message> {
    let option = |title: &'a str, detail: &'a str, modality| {
        button(column![text(title).size(18), text(detail).size(13)].spacing(4))
            .width(Length::Fill)
            .padding(14)
            .on_press(Message::ModalitySelected(modality))
    };

    column![
        text("Use a photo of your face to find every picture of you across our events.").size(15),
        option("Upload a photo", "Choose an image from your computer", Modality::Upload),
        option("Take a selfie", "Use your camera right now", Modality::Selfie),
        text("You can also drop an image file onto this window.").size(13),
        text(format!(
            "JPG, PNG, WebP, GIF or BMP, up to {}. Your photo is only used for this search.",
            still::format_size(max_upload_bytes)
        ))
        .size(12),
    ]
    .spacing(12)
    .into()
}

fn waiting<'a>(message: &str) -> Element<'a, Message> {
    container(text(message.to_owned()).size(16))
        .width(Length::Fill)
        .padding(30)
        .center_x(Length::Fill)
        .into()
}

fn selfie<'a>(camera: &CameraPhase, live_frame: Option<&Handle>) -> Element<'a, Message> {
    match camera {
        CameraPhase::Closed | CameraPhase::Opening => waiting("Starting camera..."),
        CameraPhase::Ready => {
            let frame: Element<'a, Message> = match live_frame {
                Some(handle) => iced::widget::image(handle.clone())
                    .height(Length::Fixed(IMAGE_HEIGHT))
                    .into(),
                None => Space::with_height(Length::Fixed(IMAGE_HEIGHT)).into(),
            };
            column![
                frame,
                text("Center your face in the frame.").size(13),
                button(text("Take photo")).on_press(Message::TakeSnapshot),
            ]
            .spacing(12)
            .align_x(Alignment::Center)
            .into()
        }
        CameraPhase::Failed(error) => column![
            text(error.to_string()).size(16),
            button(text("Try again")).on_press(Message::RetryCamera),
        ]
        .spacing(16)
        .into(),
    }
}

fn confirm<'a>(source: ImageSource, preview: Option<&Handle>) -> Element<'a, Message> {
    let image: Element<'a, Message> = match preview {
        Some(handle) => iced::widget::image(handle.clone())
            .height(Length::Fixed(IMAGE_HEIGHT))
            .into(),
        None => Space::with_height(Length::Fixed(IMAGE_HEIGHT)).into(),
    };
    let discard = match source {
        ImageSource::Upload => "Choose another",
        ImageSource::Selfie => "Retake",
    };

    column![
        image,
        row![
            button(text(discard)).on_press(Message::DiscardImage),
            button(text("Search my photos")).on_press(Message::ConfirmImage),
        ]
        .spacing(12),
    ]
    .spacing(16)
    .align_x(Alignment::Center)
    .into()
}
