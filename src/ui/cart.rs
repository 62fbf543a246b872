//! Cart bar and checkout summary

use iced::widget::{button, column, container, row, scrollable, text, Space};
use iced::{Alignment, Element, Length};

use crate::state::selection::{CheckoutSummary, SelectionSet};
use crate::Message;

/// Bottom bar shown while anything is selected
pub fn bar<'a>(selection: &SelectionSet) -> Option<Element<'a, Message>> {
    if selection.is_empty() {
        return None;
    }

    let count = match selection.len() {
        1 => "1 photo selected".to_string(),
        n => format!("{n} photos selected"),
    };

    let content = row![
        text(count).size(16),
        Space::with_width(Length::Fill),
        text(selection.total().to_string()).size(20),
        button(text("Clear")).on_press(Message::ClearSelection),
        button(text("Checkout")).on_press(Message::OpenCheckout),
    ]
    .spacing(16)
    .align_y(Alignment::Center);

    Some(
        container(content)
            .width(Length::Fill)
            .padding(12)
            .style(container::bordered_box)
            .into(),
    )
}

pub fn checkout<'a>(summary: &CheckoutSummary) -> Element<'a, Message> {
    if summary.photos.is_empty() {
        return column![
            text("Your cart is empty.").size(18),
            button(text("Back to events")).on_press(Message::GoHome),
        ]
        .spacing(16)
        .into();
    }

    let lines = summary.photos.iter().fold(column![].spacing(6), |col, photo| {
        col.push(
            row![
                text(photo.caption.clone()).width(Length::Fill),
                text(photo.price.to_string()),
                button(text("Remove").size(13)).on_press(Message::TogglePhoto(photo.clone())),
            ]
            .spacing(12)
            .align_y(Alignment::Center),
        )
    });

    column![
        text("Checkout").size(28),
        scrollable(lines).height(Length::FillPortion(1)),
        row![
            text("Total").size(20).width(Length::Fill),
            text(summary.total.to_string()).size(20),
        ],
        text(format!("Order reference: photos={}", summary.photo_ids())).size(12),
        button(text("Back to events")).on_press(Message::GoHome),
    ]
    .spacing(14)
    .max_width(640)
    .into()
}
