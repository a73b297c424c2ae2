pub mod sentiment;
pub mod stats;
pub(crate) mod utils;
