//! In-memory event and photo catalog
//!
//! Stands in for the storefront backend: a handful of events and a fixed
//! list of photos spread across them. Text search and per-event galleries
//! read from here; the mock recognizer draws its matches from it too.

use chrono::{NaiveDate, TimeZone, Utc};
use tracing::debug;

use super::data::{Event, EventId, Photo, PhotoId, Price};

/// Every photo in the storefront sells for the same base price
pub const BASE_PHOTO_PRICE: Price = Price::from_cents(999);

/// The storefront catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    events: Vec<Event>,
    photos: Vec<Photo>,
}

impl Catalog {
    /// Build the mock catalog with `photo_count` photos
    ///
    /// Photos are assigned to the four events round-robin, so photo 1 belongs
    /// to event "1", photo 2 to event "2", and so on.
    pub fn mock(photo_count: usize) -> Self {
        let events = vec![
            event("1", "Boston Marathon 2025", (2025, 4, 21), "Boston, MA", "Running", 587),
            event("2", "New York City Triathlon", (2025, 7, 15), "New York, NY", "Triathlon", 423),
            event("3", "Chicago Half Marathon", (2025, 9, 7), "Chicago, IL", "Running", 211),
            event("4", "Seattle Soccer Tournament", (2025, 8, 12), "Seattle, WA", "Soccer", 368),
        ];

        let photos = (0..photo_count)
            .map(|i| {
                let event = &events[i % events.len()];
                let pexels_id = 2_000_000 + i * 11;
                Photo {
                    id: PhotoId(format!("photo-{}", i + 1)),
                    url: format!(
                        "https://images.pexels.com/photos/{pexels_id}/pexels-photo-{pexels_id}.jpeg"
                    ),
                    caption: format!("Sports photo {}", i + 1),
                    price: BASE_PHOTO_PRICE,
                    date: event_start(event.date),
                    event_id: event.id.clone(),
                }
            })
            .collect();

        Catalog { events, photos }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// All photos in catalog order
    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    pub fn event(&self, id: &EventId) -> Option<&Event> {
        self.events.iter().find(|e| &e.id == id)
    }

    pub fn photo(&self, id: &PhotoId) -> Option<&Photo> {
        self.photos.iter().find(|p| &p.id == id)
    }

    /// Photos belonging to one event, in catalog order
    pub fn photos_for_event(&self, id: &EventId) -> Vec<Photo> {
        self.photos
            .iter()
            .filter(|p| &p.event_id == id)
            .cloned()
            .collect()
    }

    /// Case-insensitive text search
    ///
    /// A photo matches when the query appears in its caption or in the name,
    /// location or category of its event. A blank query matches nothing.
    pub fn search(&self, query: &str) -> Vec<Photo> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let results: Vec<Photo> = self
            .photos
            .iter()
            .filter(|photo| {
                photo.caption.to_lowercase().contains(&needle)
                    || self.event(&photo.event_id).is_some_and(|event| {
                        event.name.to_lowercase().contains(&needle)
                            || event.location.to_lowercase().contains(&needle)
                            || event.category.to_lowercase().contains(&needle)
                    })
            })
            .cloned()
            .collect();

        debug!(query, matches = results.len(), "catalog search");
        results
    }
}

fn event(
    id: &str,
    name: &str,
    (y, m, d): (i32, u32, u32),
    location: &str,
    category: &str,
    total_photos: u32,
) -> Event {
    Event {
        id: EventId(id.to_string()),
        name: name.to_string(),
        date: NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
        location: location.to_string(),
        category: category.to_string(),
        total_photos,
    }
}

/// Morning start time of an event day, used as the photo timestamp
fn event_start(date: NaiveDate) -> chrono::DateTime<Utc> {
    let start = date.and_hms_opt(8, 0, 0).unwrap_or_default();
    Utc.from_utc_datetime(&start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_assigns_events_round_robin() {
        let catalog = Catalog::mock(24);
        assert_eq!(catalog.photos().len(), 24);
        assert_eq!(catalog.photos()[0].event_id, EventId("1".into()));
        assert_eq!(catalog.photos()[1].event_id, EventId("2".into()));
        assert_eq!(catalog.photos()[4].event_id, EventId("1".into()));
        assert_eq!(catalog.photos_for_event(&EventId("3".into())).len(), 6);
    }

    #[test]
    fn test_ids_are_unique() {
        let catalog = Catalog::mock(24);
        let mut ids: Vec<_> = catalog.photos().iter().map(|p| p.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 24);
    }

    #[test]
    fn test_search_matches_event_fields() {
        let catalog = Catalog::mock(24);

        let boston = catalog.search("boston");
        assert_eq!(boston.len(), 6);
        assert!(boston.iter().all(|p| p.event_id == EventId("1".into())));

        // Category "Running" covers Boston and Chicago
        assert_eq!(catalog.search("RUNNING").len(), 12);
    }

    #[test]
    fn test_search_matches_caption() {
        let catalog = Catalog::mock(24);
        let hits = catalog.search("sports photo 12");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, PhotoId("photo-12".into()));
    }

    #[test]
    fn test_blank_search_is_empty() {
        let catalog = Catalog::mock(24);
        assert!(catalog.search("   ").is_empty());
        assert!(catalog.search("curling").is_empty());
    }
}
