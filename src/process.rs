use std::collections::BTreeMap;

use crate::constants::*;

/// Lifecycle state of a process record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Ready,
    BlockedOnDisk,
    /// Parked in `SimWait` until a child exits
    Waiting,
    /// Exited, holding only its PID until the parent collects it
    Zombie,
    /// The OS process; it never competes for the CPU
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    pub pid: Pid,
    pub priority: i32,
    pub size: u64,
    pub parent: Option<Pid>,
    /// In creation order
    pub children: Vec<Pid>,
    pub state: ProcessState,
}

impl Process {
    #[inline]
    pub fn waiting_for_child(&self) -> bool {
        self.state == ProcessState::Waiting
    }

    #[inline]
    pub fn is_zombie(&self) -> bool {
        self.state == ProcessState::Zombie
    }
}

/// All live process records and the parent/child tree linking them.
///
/// Links are PIDs rather than references; a removed PID is always detached
/// from its parent's `children` in the same call.
pub struct ProcessTable {
    processes: BTreeMap<Pid, Process>,
    next_pid: Pid,
}

impl ProcessTable {
    /// Create a table holding only the OS process
    pub fn new(os_size: u64) -> Self {
        let mut processes = BTreeMap::new();
        processes.insert(
            OS_PID,
            Process {
                pid: OS_PID,
                priority: OS_PRIORITY,
                size: os_size,
                parent: None,
                children: Vec::new(),
                state: ProcessState::Idle,
            },
        );
        ProcessTable { processes, next_pid: FIRST_USER_PID }
    }

    /// PID the next `create` will assign
    pub fn next_pid(&self) -> Pid {
        self.next_pid
    }

    /// Add a Ready process, linking it under `parent` if given
    pub fn create(&mut self, size: u64, priority: i32, parent: Option<Pid>) -> Pid {
        let pid = self.next_pid;
        self.next_pid += 1;

        if let Some(parent) = parent.and_then(|ppid| self.processes.get_mut(&ppid)) {
            parent.children.push(pid);
        }
        self.processes.insert(
            pid,
            Process {
                pid,
                priority,
                size,
                parent,
                children: Vec::new(),
                state: ProcessState::Ready,
            },
        );
        pid
    }

    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.processes.get(&pid)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.processes.contains_key(&pid)
    }

    pub fn priority(&self, pid: Pid) -> Option<i32> {
        self.get(pid).map(|p| p.priority)
    }

    pub fn state(&self, pid: Pid) -> Option<ProcessState> {
        self.get(pid).map(|p| p.state)
    }

    pub fn set_state(&mut self, pid: Pid, state: ProcessState) {
        if let Some(process) = self.processes.get_mut(&pid) {
            log::trace!("PID {}: {:?} -> {:?}", pid, process.state, state);
            process.state = state;
        }
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Records in PID order
    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.processes.values()
    }

    /// Every process below `pid`, parents before their children
    pub fn descendants(&self, pid: Pid) -> Vec<Pid> {
        let mut found = Vec::new();
        let mut stack: Vec<Pid> = match self.get(pid) {
            Some(p) => p.children.iter().rev().copied().collect(),
            None => return found,
        };

        while let Some(next) = stack.pop() {
            if next == pid || found.contains(&next) {
                continue;
            }
            found.push(next);
            if let Some(p) = self.get(next) {
                stack.extend(p.children.iter().rev());
            }
        }
        found
    }

    /// Oldest zombie among the children of `pid`
    pub fn zombie_child(&self, pid: Pid) -> Option<Pid> {
        self.get(pid)?
            .children
            .iter()
            .copied()
            .find(|&child| self.get(child).is_some_and(Process::is_zombie))
    }

    /// Delete a record and detach it from its parent
    pub fn remove(&mut self, pid: Pid) -> Option<Process> {
        if pid == OS_PID {
            return None;
        }
        let process = self.processes.remove(&pid)?;
        if let Some(parent) = process.parent.and_then(|ppid| self.processes.get_mut(&ppid)) {
            parent.children.retain(|&child| child != pid);
        }
        Some(process)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_table_holds_os() {
        let table = ProcessTable::new(100);
        let os = table.get(OS_PID).unwrap();
        assert_eq!(os.priority, OS_PRIORITY);
        assert_eq!(os.size, 100);
        assert_eq!(os.state, ProcessState::Idle);
        assert_eq!(table.next_pid(), FIRST_USER_PID);
    }

    #[test]
    fn test_pids_increase_and_are_not_reused() {
        let mut table = ProcessTable::new(100);
        assert_eq!(table.create(10, 1, None), 2);
        assert_eq!(table.create(10, 1, None), 3);
        table.remove(3);
        assert_eq!(table.create(10, 1, None), 4);
        assert!(!table.contains(3));
    }

    #[test]
    fn test_children_in_creation_order() {
        let mut table = ProcessTable::new(100);
        let parent = table.create(10, 1, None);
        let a = table.create(10, 1, Some(parent));
        let b = table.create(10, 1, Some(parent));
        assert_eq!(table.get(parent).unwrap().children, vec![a, b]);
        assert_eq!(table.get(a).unwrap().parent, Some(parent));
    }

    #[test]
    fn test_descendants_depth_first() {
        let mut table = ProcessTable::new(100);
        let root = table.create(10, 1, None); // 2
        let a = table.create(10, 1, Some(root)); // 3
        let b = table.create(10, 1, Some(root)); // 4
        let a1 = table.create(10, 1, Some(a)); // 5
        let a1x = table.create(10, 1, Some(a1)); // 6

        assert_eq!(table.descendants(root), vec![a, a1, a1x, b]);
        assert_eq!(table.descendants(b), Vec::<Pid>::new());
        assert_eq!(table.descendants(99), Vec::<Pid>::new());
    }

    #[test]
    fn test_remove_detaches_from_parent() {
        let mut table = ProcessTable::new(100);
        let parent = table.create(10, 1, None);
        let a = table.create(10, 1, Some(parent));
        let b = table.create(10, 1, Some(parent));

        let removed = table.remove(a).unwrap();
        assert_eq!(removed.pid, a);
        assert_eq!(table.get(parent).unwrap().children, vec![b]);
        assert!(table.remove(a).is_none());
    }

    #[test]
    fn test_os_cannot_be_removed() {
        let mut table = ProcessTable::new(100);
        assert!(table.remove(OS_PID).is_none());
        assert!(table.contains(OS_PID));
    }

    #[test]
    fn test_zombie_child_picks_oldest() {
        let mut table = ProcessTable::new(100);
        let parent = table.create(10, 1, None);
        let a = table.create(10, 1, Some(parent));
        let b = table.create(10, 1, Some(parent));
        let c = table.create(10, 1, Some(parent));
        assert_eq!(table.zombie_child(parent), None);

        table.set_state(c, ProcessState::Zombie);
        table.set_state(b, ProcessState::Zombie);
        assert_eq!(table.zombie_child(parent), Some(b));
        assert!(!table.get(a).unwrap().is_zombie());
    }

    #[test]
    fn test_waiting_flag_follows_state() {
        let mut table = ProcessTable::new(100);
        let pid = table.create(10, 1, None);
        assert!(!table.get(pid).unwrap().waiting_for_child());
        table.set_state(pid, ProcessState::Waiting);
        assert!(table.get(pid).unwrap().waiting_for_child());
    }
}
