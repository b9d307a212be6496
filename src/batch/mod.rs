//! Batch execution: coordinator plus the per-transfer results it produces

pub mod coordinator;
pub mod report;

pub use coordinator::BatchCoordinator;
pub use report::{BatchReport, BatchTotals, TransferResult};
