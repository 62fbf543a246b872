//! Photo tiles with add-to-cart toggles
//!
//! Used by the face results, text search and event gallery views alike.

use iced::widget::{button, column, container, row, text};
use iced::{Alignment, Element, Length};
use iced_aw::Wrap;

use crate::state::catalog::Catalog;
use crate::state::data::Photo;
use crate::state::selection::SelectionSet;
use crate::Message;

const TILE_WIDTH: f32 = 220.0;

/// Grid of photo tiles in ranking order
pub fn view<'a>(photos: &[Photo], catalog: &Catalog, selection: &SelectionSet) -> Element<'a, Message> {
    if photos.is_empty() {
        return container(text("No photos found.").size(16))
            .padding(20)
            .into();
    }

    let tiles: Vec<Element<'a, Message>> = photos
        .iter()
        .map(|photo| tile(photo, catalog, selection.contains(&photo.id)))
        .collect();

    Wrap::with_elements(tiles)
        .spacing(12.0)
        .line_spacing(12.0)
        .into()
}

fn tile<'a>(photo: &Photo, catalog: &Catalog, selected: bool) -> Element<'a, Message> {
    let event_name = catalog
        .event(&photo.event_id)
        .map(|e| e.name.clone())
        .unwrap_or_default();

    // Stand-in for the watermarked thumbnail
    let watermark = container(
        column![
            text("SPORTSHOT").size(22),
            text("#NOCOPY").size(12),
        ]
        .align_x(Alignment::Center),
    )
    .width(Length::Fill)
    .height(Length::Fixed(TILE_WIDTH * 0.75))
    .center_x(Length::Fill)
    .center_y(Length::Fixed(TILE_WIDTH * 0.75))
    .style(container::dark);

    let cart_label = if selected { "✓ In cart" } else { "Add to cart" };

    let content = column![
        watermark,
        text(photo.caption.clone()).size(16),
        text(event_name).size(12),
        text(photo.price.to_string()).size(14),
        row![
            button(text(cart_label).size(14)).on_press(Message::TogglePhoto(photo.clone())),
            button(text("Details").size(14)).on_press(Message::ShowPhoto(photo.id.clone())),
        ]
        .spacing(8),
    ]
    .spacing(6);

    container(content)
        .width(Length::Fixed(TILE_WIDTH))
        .padding(10)
        .style(if selected {
            container::bordered_box
        } else {
            container::rounded_box
        })
        .into()
}

/// Detail card for one photo
pub fn detail<'a>(photo: &Photo, catalog: &Catalog, selected: bool) -> Element<'a, Message> {
    let event = catalog.event(&photo.event_id);
    let event_line = event
        .map(|e| format!("{} · {}", e.name, e.location))
        .unwrap_or_else(|| format!("Event {}", photo.event_id));
    let cart_label = if selected { "Remove from cart" } else { "Add to cart" };

    let content = column![
        row![
            text(photo.caption.clone()).size(24).width(Length::Fill),
            button(text("✕")).on_press(Message::ClosePhoto),
        ]
        .align_y(Alignment::Center),
        text(event_line).size(14),
        text(format!("Taken {}", photo.date.format("%B %-d, %Y"))).size(14),
        text(format!("Photo {}", photo.id)).size(12),
        text(photo.url.clone()).size(11),
        text(photo.price.to_string()).size(20),
        button(text(cart_label)).on_press(Message::TogglePhoto(photo.clone())),
    ]
    .spacing(10);

    container(content)
        .width(Length::Fixed(420.0))
        .padding(20)
        .style(container::rounded_box)
        .into()
}
