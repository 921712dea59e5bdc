pub mod date;
pub mod document;
pub mod enums;

pub use date::{Date, DateError};
pub use document::*;
pub use enums::*;
