pub mod generation;
pub mod memory;

pub use generation::{GenerateRequest, GenerateResponse, GenerationJob, JobStatus, ResultFile};
pub use memory::{MemoryRecord, MemoryStatus};
