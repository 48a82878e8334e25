pub mod models;
pub mod reader;
pub mod writer;

pub use reader::StatReader;
