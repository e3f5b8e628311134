pub mod types;
pub mod filter;
pub mod filter_where;
pub mod filter_order;
pub mod predicate;
pub mod error;

pub use error::FilterError;
pub use filter::{is_valid_identifier, Filter};
pub use predicate::Predicate;
pub use types::*;
