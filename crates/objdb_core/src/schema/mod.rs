//! Class metadata: extent zones and the indexes declared on a class.

mod class;
mod index;

pub use class::{ClassInfo, Zone};
pub use index::ClassIndex;
