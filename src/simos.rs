//! Engine facade: turns each simulated event into allocator, process table,
//! scheduler and disk operations, and answers state queries.

use std::collections::{BTreeSet, VecDeque};

use crate::constants::*;
use crate::disk::{DiskSubsystem, FileReadRequest};
use crate::memory::{MemoryAllocator, MemoryItem};
use crate::process::{Process, ProcessState, ProcessTable};
use crate::scheduler::{Admission, PriorityOrder, Scheduler};

/// Machine parameters and scheduling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    pub disks: usize,
    pub ram: u64,
    pub os_size: u64,
    pub priority_order: PriorityOrder,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            disks: DEFAULT_DISKS,
            ram: DEFAULT_RAM,
            os_size: DEFAULT_OS_SIZE,
            priority_order: PriorityOrder::default(),
        }
    }
}

pub struct SimOS {
    table: ProcessTable,
    memory: MemoryAllocator,
    scheduler: Scheduler,
    disks: DiskSubsystem,
}

impl SimOS {
    /// Panics unless `0 < size_of_os <= amount_of_ram`
    pub fn new(number_of_disks: usize, amount_of_ram: u64, size_of_os: u64) -> Self {
        Self::with_config(&SimConfig {
            disks: number_of_disks,
            ram: amount_of_ram,
            os_size: size_of_os,
            ..SimConfig::default()
        })
    }

    pub fn with_config(config: &SimConfig) -> Self {
        log::debug!(
            "booting: {} disks, {} bytes RAM, {} byte OS, {:?}",
            config.disks,
            config.ram,
            config.os_size,
            config.priority_order
        );
        SimOS {
            table: ProcessTable::new(config.os_size),
            memory: MemoryAllocator::new(config.ram, config.os_size),
            scheduler: Scheduler::new(config.priority_order),
            disks: DiskSubsystem::new(config.disks),
        }
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    /// Create a top-level process. Returns false if no gap can hold `size` bytes.
    pub fn new_process(&mut self, size: u64, priority: i32) -> bool {
        let pid = self.table.next_pid();
        if self.memory.allocate(size, pid).is_none() {
            log::debug!("NewProcess({}, {}): insufficient memory", size, priority);
            return false;
        }

        let created = self.table.create(size, priority, None);
        debug_assert_eq!(created, pid);
        self.admit(pid);
        log::debug!("NewProcess({}, {}): PID {}", size, priority, pid);
        true
    }

    /// The running process forks a child with its own size and priority.
    /// The child joins the back of the ready queue; the parent keeps the CPU.
    pub fn sim_fork(&mut self) -> bool {
        let Some(parent) = self.running_user_process() else {
            log::debug!("SimFork: ignored, no user process on the CPU");
            return false;
        };
        let Some((size, priority)) = self.table.get(parent).map(|p| (p.size, p.priority)) else {
            return false;
        };

        let pid = self.table.next_pid();
        if self.memory.allocate(size, pid).is_none() {
            log::debug!("SimFork: PID {} cannot fit a {} byte child", parent, size);
            return false;
        }

        self.table.create(size, priority, Some(parent));
        self.scheduler.enqueue(pid);
        log::debug!("SimFork: PID {} forked PID {}", parent, pid);
        true
    }

    /// The running process terminates together with all its descendants.
    ///
    /// A waiting parent is resumed on the CPU at once and the record is
    /// dropped. A live parent that is not waiting gets a zombie child
    /// instead. A process without a parent disappears outright.
    pub fn sim_exit(&mut self) {
        let Some(pid) = self.running_user_process() else {
            log::debug!("SimExit: ignored, no user process on the CPU");
            return;
        };

        // reversed so children go before their parents
        for descendant in self.table.descendants(pid).into_iter().rev() {
            self.terminate(descendant);
        }

        self.memory.free(pid);
        self.scheduler.vacate();

        let parent = self
            .table
            .get(pid)
            .and_then(|p| p.parent)
            .and_then(|ppid| self.table.get(ppid))
            .map(|p| (p.pid, p.state));

        match parent {
            Some((ppid, ProcessState::Waiting)) => {
                self.table.remove(pid);
                self.scheduler.run_now(ppid);
                self.table.set_state(ppid, ProcessState::Running);
                log::debug!("SimExit: PID {} exited, waiting parent {} resumes", pid, ppid);
            }
            Some((ppid, _)) => {
                self.table.set_state(pid, ProcessState::Zombie);
                log::debug!("SimExit: PID {} is a zombie of PID {}", pid, ppid);
            }
            None => {
                self.table.remove(pid);
                log::debug!("SimExit: PID {} exited", pid);
            }
        }

        self.dispatch();
    }

    /// The running process collects a zombie child, or parks until one exits
    pub fn sim_wait(&mut self) {
        let Some(pid) = self.running_user_process() else {
            log::debug!("SimWait: ignored, no user process on the CPU");
            return;
        };

        if let Some(zombie) = self.table.zombie_child(pid) {
            self.table.remove(zombie);
            log::debug!("SimWait: PID {} reaped zombie {}", pid, zombie);
            return;
        }

        self.scheduler.vacate();
        self.table.set_state(pid, ProcessState::Waiting);
        log::debug!("SimWait: PID {} is waiting", pid);
        self.dispatch();
    }

    /// The running process blocks on a read from `disk_number`.
    /// Panics if `disk_number` is out of range.
    pub fn disk_read_request(&mut self, disk_number: usize, file_name: &str) {
        let Some(pid) = self.running_user_process() else {
            log::debug!("DiskReadRequest: ignored, no user process on the CPU");
            return;
        };

        let started = self
            .disks
            .disk_mut(disk_number)
            .submit(FileReadRequest::new(pid, file_name));
        self.scheduler.vacate();
        self.table.set_state(pid, ProcessState::BlockedOnDisk);
        log::debug!(
            "DiskReadRequest: PID {} reads {:?} from disk {} ({})",
            pid,
            file_name,
            disk_number,
            if started { "in service" } else { "queued" }
        );
        self.dispatch();
    }

    /// The request in service on `disk_number` finishes and its process is
    /// admitted to the CPU. Panics if `disk_number` is out of range.
    pub fn disk_job_completed(&mut self, disk_number: usize) {
        let Some(done) = self.disks.disk_mut(disk_number).complete() else {
            log::warn!("DiskJobCompleted: disk {} is idle", disk_number);
            return;
        };

        log::debug!(
            "DiskJobCompleted: disk {} finished {:?} for PID {}",
            disk_number,
            done.file_name,
            done.pid
        );
        self.table.set_state(done.pid, ProcessState::Ready);
        self.admit(done.pid);
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// PID on the CPU, or `NO_PROCESS` when idle
    pub fn get_cpu(&self) -> Pid {
        self.scheduler.running().unwrap_or(NO_PROCESS)
    }

    /// Ready PIDs in dispatch order
    pub fn get_ready_queue(&self) -> Vec<Pid> {
        self.scheduler.ready_queue()
    }

    /// Occupied blocks, lowest address first
    pub fn get_memory(&self) -> Vec<MemoryItem> {
        self.memory.snapshot()
    }

    /// Request in service on `disk_number`, or the idle sentinel
    pub fn get_disk(&self, disk_number: usize) -> FileReadRequest {
        self.disks.disk(disk_number).serving()
    }

    /// Pending requests on `disk_number`, next to be served first
    pub fn get_disk_queue(&self, disk_number: usize) -> VecDeque<FileReadRequest> {
        self.disks.disk(disk_number).queue().clone()
    }

    pub fn process(&self, pid: Pid) -> Option<&Process> {
        self.table.get(pid)
    }

    pub fn disk_count(&self) -> usize {
        self.disks.len()
    }

    pub fn free_memory(&self) -> u64 {
        self.memory.free_capacity()
    }

    pub fn largest_free_block(&self) -> u64 {
        self.memory.largest_gap()
    }

    /// Check cross-component consistency, reporting the first violation
    pub fn verify(&self) -> Result<(), String> {
        // memory: sorted, disjoint, in bounds, owned by live non-zombies
        let blocks = self.memory.snapshot();
        let mut cursor = 0;
        for block in &blocks {
            if block.address < cursor {
                return Err(format!("block {} overlaps its predecessor", block));
            }
            cursor = block.end();
            match self.table.get(block.pid) {
                None => return Err(format!("block {} belongs to no process", block)),
                Some(p) if p.is_zombie() => {
                    return Err(format!("zombie PID {} still holds {}", p.pid, block));
                }
                Some(_) => {}
            }
        }
        if cursor > self.memory.total() {
            return Err(format!("memory ends at {} past RAM size {}", cursor, self.memory.total()));
        }
        let free: u64 = self.memory.gaps().iter().map(|&(_, size)| size).sum();
        if self.memory.used() + free != self.memory.total() {
            return Err("used plus free memory does not add up to RAM size".to_string());
        }

        // CPU and ready queue: exactly the Running and Ready processes
        let ready = self.scheduler.ready_queue();
        if let Some(pid) = self.scheduler.running() {
            if ready.contains(&pid) {
                return Err(format!("running PID {} is also queued", pid));
            }
        }
        let mut scheduled: BTreeSet<Pid> = ready.iter().copied().collect();
        if scheduled.len() != ready.len() {
            return Err("ready queue holds a PID twice".to_string());
        }
        scheduled.extend(self.scheduler.running());
        let runnable: BTreeSet<Pid> = self
            .table
            .iter()
            .filter(|p| matches!(p.state, ProcessState::Running | ProcessState::Ready))
            .map(|p| p.pid)
            .collect();
        if scheduled != runnable {
            return Err(format!("scheduled {:?} but runnable {:?}", scheduled, runnable));
        }
        if let Some(pid) = self.scheduler.running() {
            if self.table.state(pid) != Some(ProcessState::Running) {
                return Err(format!("PID {} is on the CPU but not Running", pid));
            }
        }

        // tree links and per-state resources
        for process in self.table.iter() {
            for &child in &process.children {
                if self.table.get(child).and_then(|c| c.parent) != Some(process.pid) {
                    return Err(format!("PID {} lists stale child {}", process.pid, child));
                }
            }
            let holds_memory = self.memory.block_of(process.pid).is_some();
            if process.is_zombie() == holds_memory {
                return Err(format!("PID {} memory does not match {:?}", process.pid, process.state));
            }
            let on_disk = self.disks.holds(process.pid);
            if on_disk != (process.state == ProcessState::BlockedOnDisk) {
                return Err(format!("PID {} disk queues do not match {:?}", process.pid, process.state));
            }
        }

        Ok(())
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    /// Occupant of the CPU unless idle or the OS
    fn running_user_process(&self) -> Option<Pid> {
        self.scheduler.running().filter(|&pid| pid != OS_PID)
    }

    fn admit(&mut self, pid: Pid) {
        let table = &self.table;
        let outcome = self
            .scheduler
            .admit(pid, |p| table.priority(p).unwrap_or(OS_PRIORITY));

        match outcome {
            Admission::Dispatched => self.table.set_state(pid, ProcessState::Running),
            Admission::Preempted(previous) => {
                self.table.set_state(previous, ProcessState::Ready);
                self.table.set_state(pid, ProcessState::Running);
            }
            Admission::Queued => self.table.set_state(pid, ProcessState::Ready),
        }
    }

    fn dispatch(&mut self) {
        if let Some(pid) = self.scheduler.dispatch() {
            self.table.set_state(pid, ProcessState::Running);
        }
    }

    /// Remove a process from every component, whatever its state
    fn terminate(&mut self, pid: Pid) {
        self.memory.free(pid);
        self.scheduler.remove(pid);
        let purged = self.disks.purge(pid);
        self.table.remove(pid);
        log::trace!("terminated PID {} ({} disk requests purged)", pid, purged);
    }
}
