pub mod browser;
pub mod chapter;
pub mod comic;
pub mod error;
pub mod run;
pub mod sanitize;

pub use chapter::{Chapter, Page};
pub use comic::{Comic, Listing};
pub use error::ScrapeError;
