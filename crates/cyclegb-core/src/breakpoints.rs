#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoint {
    pub addr: u16,
    pub enabled: bool,
}

/// Execution breakpoints keyed by address.
///
/// Entries keep the order they were added in; [`Breakpoints::sorted`] gives
/// the by-address view for display.
#[derive(Debug, Default, Clone)]
pub struct Breakpoints {
    entries: Vec<Breakpoint>,
    has_enabled: bool,
}

impl Breakpoints {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, addr: u16) -> Option<usize> {
        self.entries.iter().position(|bp| bp.addr == addr)
    }

    /// Add an enabled breakpoint. An existing entry at `addr` is re-enabled
    /// and `false` is returned.
    pub fn add(&mut self, addr: u16) -> bool {
        let added = match self.position(addr) {
            Some(i) => {
                self.entries[i].enabled = true;
                false
            }
            None => {
                self.entries.push(Breakpoint {
                    addr,
                    enabled: true,
                });
                true
            }
        };
        self.recompute_fast_path();
        added
    }

    pub fn remove(&mut self, addr: u16) -> bool {
        let Some(i) = self.position(addr) else {
            return false;
        };
        self.entries.remove(i);
        self.recompute_fast_path();
        true
    }

    pub fn set_enabled(&mut self, addr: u16, enabled: bool) -> bool {
        let Some(i) = self.position(addr) else {
            return false;
        };
        self.entries[i].enabled = enabled;
        self.recompute_fast_path();
        true
    }

    /// Flip a breakpoint, returning its new state.
    pub fn toggle(&mut self, addr: u16) -> Option<bool> {
        let i = self.position(addr)?;
        let enabled = !self.entries[i].enabled;
        self.entries[i].enabled = enabled;
        self.recompute_fast_path();
        Some(enabled)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.has_enabled = false;
    }

    #[inline]
    pub fn is_hit(&self, pc: u16) -> bool {
        self.has_enabled && self.entries.iter().any(|bp| bp.enabled && bp.addr == pc)
    }

    /// Insertion order.
    pub fn entries(&self) -> &[Breakpoint] {
        &self.entries
    }

    pub fn sorted(&self) -> Vec<Breakpoint> {
        let mut out = self.entries.clone();
        out.sort_by_key(|bp| bp.addr);
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn recompute_fast_path(&mut self) {
        self.has_enabled = self.entries.iter().any(|bp| bp.enabled);
    }
}
