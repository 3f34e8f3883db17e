pub mod loaders;
pub mod outcome;
pub mod record;

pub use loaders::{load_records, parse_records};
pub use outcome::{
    BatchRun, LocateOutcome, OutcomeStatus, ProcessingOutcome, RunSummary, SecondaryViewResult,
    UpdateStatus,
};
pub use record::{InputRecord, SearchKey};
