//! Item module - published content units and their taxonomy.

mod item;
mod taxonomy;

pub use item::{Item, ItemStatus};
pub use taxonomy::{TaxonomyDimension, TaxonomyFilter, TaxonomyTag};
