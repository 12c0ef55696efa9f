//! Domain model (ids, records, errors, events).

pub mod errors;
pub mod events;
pub mod ids;
pub mod record;

pub use errors::{
    ConfigError, RegistrationError, RunnerError, StoreError, TaskError, TaskIdError,
};
pub use events::RunnerEvent;
pub use ids::TaskId;
pub use record::{ClaimQuery, TaskRecord, UpsertOutcome, claim_order};
