/// State management module
///
/// This module handles all storefront state, including:
/// - Shared data structures (data.rs)
/// - The mock event/photo catalog and text search (catalog.rs)
/// - The photo selection / cart (selection.rs)
/// - The light/dark appearance preference (theme.rs)

pub mod catalog;
pub mod data;
pub mod selection;
pub mod theme;
