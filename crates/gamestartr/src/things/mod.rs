mod store;
mod thing;

pub use store::{ThingGroup, ThingStore, ThingStoreError};
pub use thing::{Thing, ThingId};
