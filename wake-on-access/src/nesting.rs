use std::cell::Cell;

thread_local! {
    /// Number of wake sequences currently running on this thread.
    static DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// RAII marker for a wake sequence on the current thread.
///
/// The access gate can be re-entered from inside its own blocking wait, for
/// example when a progress display performs a resource access. The guard only
/// observes such nesting; it never prevents it.
pub struct NestGuard {
    level: u32,
}

impl NestGuard {
    #[must_use]
    pub fn enter() -> Self {
        let level = DEPTH.with(|depth| {
            let level = depth.get() + 1;
            depth.set(level);
            level
        });
        Self { level }
    }

    /// Depth including this guard; 1 for a non-nested call
    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn is_nested(&self) -> bool {
        self.level > 1
    }
}

impl Drop for NestGuard {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Current depth on this thread
pub fn level() -> u32 {
    DEPTH.with(Cell::get)
}
