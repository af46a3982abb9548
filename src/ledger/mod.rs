//! Transfer ledger: wire records, pagination, merge engine and derived views.

pub mod accumulator;
pub mod cursor;
pub mod record;
pub mod summary;
pub mod views;

pub use accumulator::{
    ActionsPage, FilterScope, IngestOutcome, Ledger, LedgerAccumulator, MergeStats, PageRequest,
    RequestKind,
};
pub use cursor::PaginationCursor;
pub use record::{RawTransfer, TransferRecord};
pub use views::LedgerView;
