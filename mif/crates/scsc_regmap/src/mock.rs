//! Recording register map
//!
//! [`MockRegmap`] stands in for real hardware in tests and in the simulator.
//! Registers read as zero until written or preset, every successful access is
//! appended to an ordered log, and individual offsets can be made to fail.
//! Write hooks let a test model hardware that reacts to a write, such as a
//! status register following a control bit.

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use log::trace;
use spin::Mutex;

use crate::{Regmap, RegmapError, RegmapResult};

/// One recorded register access.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Access {
    Read { offset: u32, value: u32 },
    Write { offset: u32, value: u32 },
}

/// Hook run after a write to a watched offset lands.
///
/// Receives the written value and the register file, which it may modify.
pub type WriteHook = Box<dyn Fn(u32, &mut BTreeMap<u32, u32>) + Send + Sync>;

pub struct MockRegmap {
    name: String,
    regs: Mutex<BTreeMap<u32, u32>>,
    log: Mutex<Vec<Access>>,
    failing_reads: Mutex<BTreeSet<u32>>,
    failing_writes: Mutex<BTreeSet<u32>>,
    hooks: Mutex<Vec<(u32, WriteHook)>>,
}

impl MockRegmap {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            regs: Mutex::new(BTreeMap::new()),
            log: Mutex::new(Vec::new()),
            failing_reads: Mutex::new(BTreeSet::new()),
            failing_writes: Mutex::new(BTreeSet::new()),
            hooks: Mutex::new(Vec::new()),
        }
    }

    /// Builder form of [`MockRegmap::set`].
    #[must_use]
    pub fn with_value(self, offset: u32, value: u32) -> Self {
        self.set(offset, value);
        self
    }

    /// Set a register without recording an access.
    pub fn set(&self, offset: u32, value: u32) {
        self.regs.lock().insert(offset, value);
    }

    /// Current register value without recording an access.
    #[must_use]
    pub fn get(&self, offset: u32) -> u32 {
        self.regs.lock().get(&offset).copied().unwrap_or(0)
    }

    /// Copy of the whole register file.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<u32, u32> {
        self.regs.lock().clone()
    }

    /// Every recorded access, oldest first.
    #[must_use]
    pub fn accesses(&self) -> Vec<Access> {
        self.log.lock().clone()
    }

    /// Every recorded write as `(offset, value)`, oldest first.
    #[must_use]
    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.log
            .lock()
            .iter()
            .filter_map(|access| match *access {
                Access::Write { offset, value } => Some((offset, value)),
                Access::Read { .. } => None,
            })
            .collect()
    }

    /// Values written to one offset, oldest first.
    #[must_use]
    pub fn writes_to(&self, offset: u32) -> Vec<u32> {
        self.writes()
            .into_iter()
            .filter(|&(o, _)| o == offset)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn clear_log(&self) {
        self.log.lock().clear();
    }

    /// Make every read of `offset` fail until [`MockRegmap::heal`].
    pub fn fail_reads_at(&self, offset: u32) {
        self.failing_reads.lock().insert(offset);
    }

    /// Make every write of `offset` fail until [`MockRegmap::heal`].
    pub fn fail_writes_at(&self, offset: u32) {
        self.failing_writes.lock().insert(offset);
    }

    pub fn heal(&self, offset: u32) {
        self.failing_reads.lock().remove(&offset);
        self.failing_writes.lock().remove(&offset);
    }

    /// Run `hook` after every successful write to `offset`.
    pub fn on_write<F>(&self, offset: u32, hook: F)
    where
        F: Fn(u32, &mut BTreeMap<u32, u32>) + Send + Sync + 'static,
    {
        self.hooks.lock().push((offset, Box::new(hook)));
    }
}

impl Regmap for MockRegmap {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, offset: u32) -> RegmapResult<u32> {
        if self.failing_reads.lock().contains(&offset) {
            return Err(RegmapError::Read { offset });
        }
        let value = self.get(offset);
        self.log.lock().push(Access::Read { offset, value });
        Ok(value)
    }

    fn write(&self, offset: u32, value: u32) -> RegmapResult<()> {
        if self.failing_writes.lock().contains(&offset) {
            return Err(RegmapError::Write { offset });
        }
        trace!("{}: write 0x{:04x} = 0x{:08x}", self.name, offset, value);

        let hooks = self.hooks.lock();
        let mut regs = self.regs.lock();
        regs.insert(offset, value);
        hooks
            .iter()
            .filter(|(watched, _)| *watched == offset)
            .for_each(|(_, hook)| hook(value, &mut *regs));
        drop(regs);
        drop(hooks);

        self.log.lock().push(Access::Write { offset, value });
        Ok(())
    }
}
