pub mod ad;
pub mod filter;

pub use filter::FilterEscaping;
