pub mod category;
pub mod content;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod validity;

pub use category::{category_from_label, infer_category};
pub use content::RenderedContent;
pub use error::{ExtractError, FetchError};
pub use extract::{ExtractionConfig, Extractor, ExtractorRegistry};
pub use fetch::{ContentFetcher, HeadlessFetcher, HttpFetcher, SourceFetcher};
pub use validity::{parse_validity_date, parse_validity_window, ValidityWindow};
