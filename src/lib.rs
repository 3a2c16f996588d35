pub mod constants;
pub mod disk;
pub mod io;
pub mod logger;
pub mod memory;
pub mod process;
pub mod scheduler;
pub mod simos;

// Re-export commonly used items for convenience
pub use constants::*;
pub use disk::FileReadRequest;
pub use memory::MemoryItem;
pub use process::{Process, ProcessState};
pub use scheduler::PriorityOrder;
pub use simos::{SimConfig, SimOS};
