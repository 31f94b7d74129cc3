pub mod consumption_event;
pub mod inventory_item;
pub mod operation_log;
pub mod task;

pub use consumption_event::ConsumptionReason;
pub use inventory_item::{Category, StorageLocation, Unit};
pub use operation_log::OperationKind;
pub use task::{RecurrenceFrequency, TaskPriority, TaskStatus};
