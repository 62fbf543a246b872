//! Photo selection (the cart)
//!
//! The same `SelectionSet` backs the recognition results, text search and
//! event gallery views. It owns copies of the selected photos so the cart
//! can still be rendered after the result list it came from is replaced.

use super::data::{Photo, PhotoId, Price};

/// The user's chosen photos, in the order they were picked
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSet {
    members: Vec<Photo>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the photo if absent, remove it if present
    ///
    /// Returns `true` when the photo is selected after the call.
    pub fn toggle(&mut self, photo: &Photo) -> bool {
        if let Some(index) = self.position(&photo.id) {
            self.members.remove(index);
            false
        } else {
            self.members.push(photo.clone());
            true
        }
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }

    /// Sum of the prices of all selected photos
    pub fn total(&self) -> Price {
        self.members.iter().map(|p| p.price).sum()
    }

    pub fn contains(&self, id: &PhotoId) -> bool {
        self.position(id).is_some()
    }

    pub fn members(&self) -> &[Photo] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn position(&self, id: &PhotoId) -> Option<usize> {
        self.members.iter().position(|p| &p.id == id)
    }
}

/// What the checkout flow receives from the cart
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSummary {
    pub photos: Vec<Photo>,
    pub total: Price,
}

impl CheckoutSummary {
    /// Comma-separated photo ids, as carried in the `photos=` checkout link
    pub fn photo_ids(&self) -> String {
        self.photos
            .iter()
            .map(|p| p.id.0.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl From<&SelectionSet> for CheckoutSummary {
    fn from(selection: &SelectionSet) -> Self {
        CheckoutSummary {
            photos: selection.members().to_vec(),
            total: selection.total(),
        }
    }
}
