/// Process identifier. PIDs are assigned once and never reused.
pub type Pid = u32;

/// PID of the resident OS process
pub const OS_PID: Pid = 1;
pub const FIRST_USER_PID: Pid = 2;

/// Reported by `GetCPU` when the CPU is idle and by `GetDisk` for an idle disk
pub const NO_PROCESS: Pid = 0;

pub const OS_PRIORITY: i32 = 0;

// driver defaults
pub const DEFAULT_DISKS: usize = 2;
pub const DEFAULT_RAM: u64 = 1_000_000;
pub const DEFAULT_OS_SIZE: u64 = 100_000;
