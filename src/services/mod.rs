pub mod error_classifier;
pub mod record_locator;
pub mod result_log;
pub mod secondary_view;

pub use error_classifier::{Classification, ErrorClassifier};
pub use record_locator::RecordLocator;
pub use result_log::ResultLog;
pub use secondary_view::SecondaryViewHandler;
