/// View helpers
///
/// Each submodule renders one part of the window from borrowed state and
/// emits `crate::Message`s; none of them hold state of their own.

pub mod capture_modal;
pub mod cart;
pub mod photo_grid;

use iced::widget::image::Handle;

use crate::capture::still::Preview;

/// Upload a camera frame for display
pub fn frame_handle(frame: &::image::DynamicImage) -> Handle {
    let rgba = frame.to_rgba8();
    Handle::from_rgba(rgba.width(), rgba.height(), rgba.into_raw())
}

/// Upload a confirm-screen preview for display
pub fn preview_handle(preview: &Preview) -> Handle {
    Handle::from_rgba(preview.width, preview.height, preview.rgba.clone())
}
