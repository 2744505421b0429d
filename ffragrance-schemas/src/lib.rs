pub mod category;
pub mod chemical;
pub mod color;
pub mod file_formats;
pub mod formula;
pub mod tag;

use uuid::Uuid;

/// Common surface of every stored entity.
///
/// Identity is by `id`; `name` is only used for display and lookups by the
/// operator, two records may share a name.
pub trait Record: Clone {
    /// Human readable label for the entity type, used in error messages.
    const KIND: &'static str;

    fn id(&self) -> Uuid;
    fn name(&self) -> &str;
}
