/// Shared data structures for the storefront
///
/// These structs represent the data model that flows between
/// the catalog, the recognition backend and the UI layer.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::ops::Add;

/// Identifier of a single photo (e.g. "photo-7")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhotoId(pub String);

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an event (e.g. "1")
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventId(pub String);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A price in minor units (cents)
///
/// Integer cents keep cart totals exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Price(pub u64);

impl Price {
    pub const ZERO: Price = Price(0);

    pub const fn from_cents(cents: u64) -> Self {
        Price(cents)
    }

    pub fn cents(self) -> u64 {
        self.0
    }
}

impl Add for Price {
    type Output = Price;

    fn add(self, rhs: Price) -> Price {
        Price(self.0 + rhs.0)
    }
}

impl std::iter::Sum for Price {
    fn sum<I: Iterator<Item = Price>>(iter: I) -> Price {
        iter.fold(Price::ZERO, Add::add)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R$ {}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// A purchasable event photo
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    /// Unique photo ID
    pub id: PhotoId,
    /// Location of the watermarked full image
    pub url: String,
    /// Short caption shown under the tile
    pub caption: String,
    /// Unit price
    pub price: Price,
    /// When the photo was taken
    pub date: DateTime<Utc>,
    /// Event the photo belongs to
    pub event_id: EventId,
}

/// A sports event with published photos
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub date: NaiveDate,
    pub location: String,
    /// e.g. "Running", "Triathlon", "Soccer"
    pub category: String,
    pub total_photos: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_display() {
        assert_eq!(Price::from_cents(999).to_string(), "R$ 9.99");
        assert_eq!(Price::from_cents(5).to_string(), "R$ 0.05");
        assert_eq!(Price::ZERO.to_string(), "R$ 0.00");
    }

    #[test]
    fn test_price_sum() {
        let total: Price = [999, 999, 1500].into_iter().map(Price::from_cents).sum();
        assert_eq!(total, Price::from_cents(3498));

        let empty: Price = std::iter::empty::<Price>().sum();
        assert_eq!(empty, Price::ZERO);
    }
}
