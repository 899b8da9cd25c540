//! Wake-on-access: send a wake signal to a sleeping host right before a
//! resource on it is accessed, and wait until it answers.

pub mod collab;
pub mod discovery;
pub mod error;
pub mod gate;
pub mod jobs;
pub mod nesting;
pub mod registry;
pub mod sequencer;
pub mod wait;

#[cfg(test)]
mod testing;

pub use collab::{CandidateSource, Clock, NetworkProvider, Notifier, NotifyKind, ProgressReporter, SystemClock};
pub use error::WakeError;
pub use gate::{AccessContext, AccessOutcome, WakeOnAccess};
pub use jobs::{JobHandle, JobRunner};
pub use registry::{Registry, RegistryStore, SqliteStore};
pub use sequencer::{WakeOutcome, WakeSequencer};
