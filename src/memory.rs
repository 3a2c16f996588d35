use crate::constants::*;

/// A contiguous block of RAM owned by a single process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryItem {
    pub address: u64,
    pub size: u64,
    pub pid: Pid,
}

impl MemoryItem {
    /// First address past the end of the block
    #[inline]
    pub fn end(&self) -> u64 {
        self.address + self.size
    }
}

impl std::fmt::Display for MemoryItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.address, self.size, self.pid)
    }
}

/// Flat physical address space with first-fit placement.
///
/// Only occupied blocks are stored, sorted by address. Free space is the set
/// of gaps between consecutive blocks plus the tail after the last one, so
/// freeing a block coalesces with its neighbours without extra bookkeeping.
pub struct MemoryAllocator {
    total: u64,
    blocks: Vec<MemoryItem>,
}

impl MemoryAllocator {
    /// Create an address space of `total` bytes with the OS resident at `[0, os_size)`
    pub fn new(total: u64, os_size: u64) -> Self {
        assert!(total > 0, "amount of RAM must be positive");
        assert!(
            os_size > 0 && os_size <= total,
            "OS size {} must be in (0, {}]",
            os_size,
            total
        );

        MemoryAllocator {
            total,
            blocks: vec![MemoryItem { address: 0, size: os_size, pid: OS_PID }],
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn used(&self) -> u64 {
        self.blocks.iter().map(|b| b.size).sum()
    }

    pub fn free_capacity(&self) -> u64 {
        self.total - self.used()
    }

    /// Free ranges as `(address, size)` in ascending address order
    pub fn gaps(&self) -> Vec<(u64, u64)> {
        let mut gaps = Vec::new();
        let mut cursor = 0;
        for block in &self.blocks {
            if block.address > cursor {
                gaps.push((cursor, block.address - cursor));
            }
            cursor = block.end();
        }
        if self.total > cursor {
            gaps.push((cursor, self.total - cursor));
        }
        gaps
    }

    pub fn largest_gap(&self) -> u64 {
        self.gaps().iter().map(|&(_, size)| size).max().unwrap_or(0)
    }

    /// Place a block of `size` bytes for `pid` in the lowest gap that fits.
    ///
    /// Returns the block address, or `None` without touching the layout when
    /// no single gap is large enough.
    pub fn allocate(&mut self, size: u64, pid: Pid) -> Option<u64> {
        if size == 0 {
            return None;
        }
        debug_assert!(self.block_of(pid).is_none(), "PID {} already owns memory", pid);

        let mut cursor = 0;
        let mut slot = self.blocks.len();
        for (index, block) in self.blocks.iter().enumerate() {
            if block.address - cursor >= size {
                slot = index;
                break;
            }
            cursor = block.end();
        }

        if slot == self.blocks.len() && self.total - cursor < size {
            log::trace!("no gap of {} bytes for PID {}", size, pid);
            return None;
        }

        self.blocks.insert(slot, MemoryItem { address: cursor, size, pid });
        log::trace!("placed PID {} at [{}, {})", pid, cursor, cursor + size);
        Some(cursor)
    }

    /// Release the block owned by `pid`. The OS block is never released.
    pub fn free(&mut self, pid: Pid) -> Option<MemoryItem> {
        if pid == OS_PID {
            return None;
        }
        let index = self.blocks.iter().position(|b| b.pid == pid)?;
        let block = self.blocks.remove(index);
        log::trace!("released [{}, {}) of PID {}", block.address, block.end(), pid);
        Some(block)
    }

    pub fn block_of(&self, pid: Pid) -> Option<&MemoryItem> {
        self.blocks.iter().find(|b| b.pid == pid)
    }

    /// Current layout, lowest address first
    pub fn snapshot(&self) -> Vec<MemoryItem> {
        self.blocks.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(address: u64, size: u64, pid: Pid) -> MemoryItem {
        MemoryItem { address, size, pid }
    }

    #[test]
    fn test_initial_layout() {
        let mem = MemoryAllocator::new(1_000_000, 100_000);
        assert_eq!(mem.snapshot(), vec![item(0, 100_000, OS_PID)]);
        assert_eq!(mem.free_capacity(), 900_000);
        assert_eq!(mem.gaps(), vec![(100_000, 900_000)]);
    }

    #[test]
    fn test_os_fills_all_memory() {
        let mut mem = MemoryAllocator::new(500, 500);
        assert!(mem.gaps().is_empty());
        assert_eq!(mem.allocate(1, 2), None);
    }

    #[test]
    #[should_panic]
    fn test_os_larger_than_ram_panics() {
        MemoryAllocator::new(100, 101);
    }

    #[test]
    fn test_sequential_allocation() {
        let mut mem = MemoryAllocator::new(1000, 100);
        assert_eq!(mem.allocate(200, 2), Some(100));
        assert_eq!(mem.allocate(300, 3), Some(300));
        assert_eq!(mem.used(), 600);
        assert_eq!(mem.largest_gap(), 400);
    }

    #[test]
    fn test_exact_fit_at_tail() {
        let mut mem = MemoryAllocator::new(1000, 100);
        assert_eq!(mem.allocate(900, 2), Some(100));
        assert_eq!(mem.free_capacity(), 0);
        assert_eq!(mem.allocate(1, 3), None);
    }

    #[test]
    fn test_zero_size_rejected() {
        let mut mem = MemoryAllocator::new(1000, 100);
        assert_eq!(mem.allocate(0, 2), None);
        assert_eq!(mem.snapshot().len(), 1);
    }

    #[test]
    fn test_first_fit_reuses_lowest_hole() {
        let mut mem = MemoryAllocator::new(1000, 100);
        mem.allocate(100, 2); // [100, 200)
        mem.allocate(100, 3); // [200, 300)
        mem.allocate(100, 4); // [300, 400)
        mem.allocate(100, 5); // [400, 500)
        mem.free(3);
        mem.free(5);

        // Both the hole at 200 and the one at 400 fit; the lower wins
        assert_eq!(mem.allocate(50, 6), Some(200));
        // Remaining 50 bytes at 250 are too small, next fit is at 400
        assert_eq!(mem.allocate(80, 7), Some(400));

        let pids: Vec<Pid> = mem.snapshot().iter().map(|b| b.pid).collect();
        assert_eq!(pids, vec![OS_PID, 2, 6, 4, 7]);
    }

    #[test]
    fn test_fragmentation_is_not_compacted() {
        let mut mem = MemoryAllocator::new(500, 100);
        mem.allocate(100, 2); // [100, 200)
        mem.allocate(100, 3); // [200, 300)
        mem.allocate(100, 4); // [300, 400)
        mem.free(2);
        // 200 bytes free in total, but split into two gaps of 100
        assert_eq!(mem.free_capacity(), 200);
        assert_eq!(mem.allocate(150, 5), None);
        assert_eq!(mem.snapshot().len(), 3);
    }

    #[test]
    fn test_adjacent_gaps_coalesce() {
        let mut mem = MemoryAllocator::new(500, 100);
        mem.allocate(100, 2);
        mem.allocate(100, 3);
        mem.allocate(100, 4);
        mem.free(2);
        mem.free(3);
        assert_eq!(mem.gaps(), vec![(100, 200), (400, 100)]);
        assert_eq!(mem.allocate(200, 5), Some(100));
    }

    #[test]
    fn test_os_block_cannot_be_freed() {
        let mut mem = MemoryAllocator::new(1000, 100);
        assert_eq!(mem.free(OS_PID), None);
        assert_eq!(mem.free(42), None);
        assert_eq!(mem.snapshot(), vec![item(0, 100, OS_PID)]);
    }

    #[test]
    fn test_display() {
        assert_eq!(item(100, 20, 3).to_string(), "100:20:3");
    }
}
