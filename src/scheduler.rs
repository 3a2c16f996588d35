use std::collections::VecDeque;

use crate::constants::*;

/// Which end of the priority scale is more urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriorityOrder {
    /// Larger numbers preempt smaller ones
    #[default]
    HigherFirst,
    /// Smaller numbers preempt larger ones
    LowerFirst,
}

impl PriorityOrder {
    /// Strict comparison: equal priorities never outrank each other
    #[inline]
    pub fn outranks(self, candidate: i32, occupant: i32) -> bool {
        match self {
            PriorityOrder::HigherFirst => candidate > occupant,
            PriorityOrder::LowerFirst => candidate < occupant,
        }
    }
}

/// Outcome of admitting a newly ready process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The CPU was idle and the process took it
    Dispatched,
    /// The process took the CPU from the given PID, which was requeued
    Preempted(Pid),
    /// The process was appended to the ready queue
    Queued,
}

/// The single CPU slot and the FIFO ready queue
pub struct Scheduler {
    cpu: Option<Pid>,
    ready: VecDeque<Pid>,
    order: PriorityOrder,
}

impl Scheduler {
    pub fn new(order: PriorityOrder) -> Self {
        Scheduler { cpu: None, ready: VecDeque::new(), order }
    }

    pub fn order(&self) -> PriorityOrder {
        self.order
    }

    pub fn running(&self) -> Option<Pid> {
        self.cpu
    }

    pub fn ready_queue(&self) -> Vec<Pid> {
        self.ready.iter().copied().collect()
    }

    pub fn is_queued(&self, pid: Pid) -> bool {
        self.ready.contains(&pid)
    }

    /// Hand a ready process to the CPU, preempting the occupant if the
    /// newcomer strictly outranks it, otherwise queue it at the back
    pub fn admit(&mut self, pid: Pid, priority_of: impl Fn(Pid) -> i32) -> Admission {
        let Some(occupant) = self.cpu else {
            self.cpu = Some(pid);
            return Admission::Dispatched;
        };

        if self.order.outranks(priority_of(pid), priority_of(occupant)) {
            self.ready.push_back(occupant);
            self.cpu = Some(pid);
            log::trace!("PID {} preempts PID {}", pid, occupant);
            Admission::Preempted(occupant)
        } else {
            self.ready.push_back(pid);
            Admission::Queued
        }
    }

    /// Append to the ready queue without any preemption check
    pub fn enqueue(&mut self, pid: Pid) {
        self.ready.push_back(pid);
    }

    /// Take the current occupant off the CPU
    pub fn vacate(&mut self) -> Option<Pid> {
        self.cpu.take()
    }

    /// If the CPU is idle, move the head of the ready queue onto it
    pub fn dispatch(&mut self) -> Option<Pid> {
        if self.cpu.is_some() {
            return None;
        }
        let next = self.ready.pop_front()?;
        self.cpu = Some(next);
        log::trace!("dispatched PID {}", next);
        Some(next)
    }

    /// Put `pid` on the idle CPU directly, skipping the ready queue
    pub fn run_now(&mut self, pid: Pid) {
        debug_assert!(self.cpu.is_none(), "CPU is occupied by {:?}", self.cpu);
        self.ready.retain(|&p| p != pid);
        self.cpu = Some(pid);
    }

    /// Forget `pid`, whether it is queued or on the CPU
    pub fn remove(&mut self, pid: Pid) -> bool {
        if self.cpu == Some(pid) {
            self.cpu = None;
            return true;
        }
        let before = self.ready.len();
        self.ready.retain(|&p| p != pid);
        self.ready.len() != before
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(PriorityOrder::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // priority of a PID is the PID itself unless overridden
    fn by_pid(pid: Pid) -> i32 {
        pid as i32
    }

    #[test]
    fn test_idle_cpu_takes_first_admission() {
        let mut sched = Scheduler::default();
        assert_eq!(sched.running(), None);
        assert_eq!(sched.admit(2, by_pid), Admission::Dispatched);
        assert_eq!(sched.running(), Some(2));
        assert!(sched.ready_queue().is_empty());
    }

    #[test]
    fn test_higher_priority_preempts() {
        let mut sched = Scheduler::default();
        sched.admit(2, by_pid);
        assert_eq!(sched.admit(5, by_pid), Admission::Preempted(2));
        assert_eq!(sched.running(), Some(5));
        assert_eq!(sched.ready_queue(), vec![2]);
    }

    #[test]
    fn test_equal_priority_does_not_preempt() {
        let mut sched = Scheduler::default();
        sched.admit(2, |_| 7);
        assert_eq!(sched.admit(3, |_| 7), Admission::Queued);
        assert_eq!(sched.running(), Some(2));
        assert_eq!(sched.ready_queue(), vec![3]);
    }

    #[test]
    fn test_lower_first_policy() {
        let mut sched = Scheduler::new(PriorityOrder::LowerFirst);
        sched.admit(5, by_pid);
        assert_eq!(sched.admit(7, by_pid), Admission::Queued);
        assert_eq!(sched.admit(3, by_pid), Admission::Preempted(5));
        assert_eq!(sched.ready_queue(), vec![7, 5]);
    }

    #[test]
    fn test_dispatch_is_fifo() {
        let mut sched = Scheduler::default();
        sched.admit(9, by_pid);
        sched.admit(3, by_pid);
        sched.admit(4, by_pid);
        sched.enqueue(8);

        assert_eq!(sched.dispatch(), None); // CPU still busy
        assert_eq!(sched.vacate(), Some(9));
        assert_eq!(sched.dispatch(), Some(3));
        sched.vacate();
        assert_eq!(sched.dispatch(), Some(4));
        sched.vacate();
        assert_eq!(sched.dispatch(), Some(8));
        sched.vacate();
        assert_eq!(sched.dispatch(), None);
    }

    #[test]
    fn test_enqueue_never_preempts() {
        let mut sched = Scheduler::default();
        sched.admit(2, by_pid);
        sched.enqueue(100);
        assert_eq!(sched.running(), Some(2));
        assert_eq!(sched.ready_queue(), vec![100]);
    }

    #[test]
    fn test_run_now_skips_queue() {
        let mut sched = Scheduler::default();
        sched.enqueue(3);
        sched.enqueue(4);
        sched.run_now(4);
        assert_eq!(sched.running(), Some(4));
        assert_eq!(sched.ready_queue(), vec![3]);
    }

    #[test]
    fn test_remove() {
        let mut sched = Scheduler::default();
        sched.admit(2, |_| 0);
        sched.admit(3, |_| 0);
        assert!(sched.remove(3));
        assert!(!sched.is_queued(3));
        assert!(sched.remove(2));
        assert_eq!(sched.running(), None);
        assert!(!sched.remove(2));
    }
}
