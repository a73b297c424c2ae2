// ============ Model implementations ============

pub(crate) mod distilbert;

// Public option types (for builder entry points)
pub use distilbert::DistilBertCheckpoint;
