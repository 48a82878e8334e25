pub mod filters;
pub mod identifier;

pub use filters::metric_ids_for_type;
pub use identifier::{decode, encode, is_time_based, metric_title};
