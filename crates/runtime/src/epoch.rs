/// Identifies one logical query attempt.
///
/// Epochs are handed out in strictly increasing order; async completions carry
/// the epoch they were started under and are applied only while it is still
/// current.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(pub u64);

impl std::fmt::Display for Epoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Generation counter owning the single "current" epoch.
#[derive(Debug, Default)]
pub struct EpochClock {
    issued: u64,
    current: Option<Epoch>,
}

impl EpochClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidates the current epoch (if any) and issues the next one.
    pub fn advance(&mut self) -> Epoch {
        self.issued = self.issued.wrapping_add(1);
        let epoch = Epoch(self.issued);
        self.current = Some(epoch);
        epoch
    }

    /// Invalidates the current epoch without issuing a new one.
    ///
    /// Returns the epoch that was retired.
    pub fn retire(&mut self) -> Option<Epoch> {
        self.current.take()
    }

    pub fn current(&self) -> Option<Epoch> {
        self.current
    }

    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.current == Some(epoch)
    }
}
