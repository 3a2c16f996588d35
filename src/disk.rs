use std::collections::VecDeque;

use crate::constants::*;

/// A pending or in-service read of a file on behalf of a process.
///
/// The default value (PID 0, empty file name) stands for an idle disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReadRequest {
    pub pid: Pid,
    pub file_name: String,
}

impl FileReadRequest {
    pub fn new(pid: Pid, file_name: impl Into<String>) -> Self {
        FileReadRequest { pid, file_name: file_name.into() }
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.pid == NO_PROCESS
    }
}

/// One disk: at most one request in service plus a FIFO of waiting requests
#[derive(Debug, Default)]
pub struct Disk {
    serving: Option<FileReadRequest>,
    queue: VecDeque<FileReadRequest>,
}

impl Disk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        self.serving.is_none()
    }

    /// Queue a request, starting it right away if the disk is idle.
    /// Returns `true` when the request went straight into service.
    pub fn submit(&mut self, request: FileReadRequest) -> bool {
        if self.serving.is_none() {
            self.serving = Some(request);
            true
        } else {
            self.queue.push_back(request);
            false
        }
    }

    /// Finish the request in service and start the next queued one
    pub fn complete(&mut self) -> Option<FileReadRequest> {
        let done = self.serving.take()?;
        self.serving = self.queue.pop_front();
        Some(done)
    }

    /// Drop every request belonging to `pid`. If the in-service request is
    /// dropped, the next queued request takes its place.
    pub fn purge(&mut self, pid: Pid) -> usize {
        let before = self.queue.len();
        self.queue.retain(|r| r.pid != pid);
        let mut removed = before - self.queue.len();

        if self.serving.as_ref().is_some_and(|r| r.pid == pid) {
            self.serving = self.queue.pop_front();
            removed += 1;
        }
        removed
    }

    /// Request in service, or the idle sentinel
    pub fn serving(&self) -> FileReadRequest {
        self.serving.clone().unwrap_or_default()
    }

    /// Waiting requests, next to be served first
    pub fn queue(&self) -> &VecDeque<FileReadRequest> {
        &self.queue
    }

    fn holds(&self, pid: Pid) -> bool {
        self.serving.as_ref().is_some_and(|r| r.pid == pid) || self.queue.iter().any(|r| r.pid == pid)
    }
}

/// The fixed set of disks attached to the simulated machine
pub struct DiskSubsystem {
    disks: Vec<Disk>,
}

impl DiskSubsystem {
    pub fn new(count: usize) -> Self {
        DiskSubsystem { disks: (0..count).map(|_| Disk::new()).collect() }
    }

    pub fn len(&self) -> usize {
        self.disks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disks.is_empty()
    }

    /// Panics if `number` is not a valid disk index
    pub fn disk(&self, number: usize) -> &Disk {
        let count = self.disks.len();
        self.disks
            .get(number)
            .unwrap_or_else(|| panic!("disk {} out of range (machine has {} disks)", number, count))
    }

    /// Panics if `number` is not a valid disk index
    pub fn disk_mut(&mut self, number: usize) -> &mut Disk {
        let count = self.disks.len();
        self.disks
            .get_mut(number)
            .unwrap_or_else(|| panic!("disk {} out of range (machine has {} disks)", number, count))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Disk> {
        self.disks.iter()
    }

    /// Remove all requests of `pid` from every disk
    pub fn purge(&mut self, pid: Pid) -> usize {
        self.disks.iter_mut().map(|d| d.purge(pid)).sum()
    }

    /// Whether any disk is serving or holding a request for `pid`
    pub fn holds(&self, pid: Pid) -> bool {
        self.disks.iter().any(|d| d.holds(pid))
    }
}
