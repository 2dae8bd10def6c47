//! Fire-once countdown latch for one aggregation attempt.

/// Coordination state for one fan-out/join.
///
/// `outstanding` counts fetches that have not reported back. `fired` flips to
/// `true` exactly once, from whichever entry point first observes zero.
#[derive(Debug, Default)]
pub struct PendingJoin {
    outstanding: usize,
    fired: bool,
}

impl PendingJoin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one more fetch. Only valid before dispatch.
    pub fn register(&mut self) {
        debug_assert!(!self.fired, "register after the join fired");
        self.outstanding += 1;
    }

    /// Record one completed fetch. Returns `true` if this arrival fires the join.
    pub fn arrive(&mut self) -> bool {
        self.outstanding = self.outstanding.saturating_sub(1);
        self.fire_if_ready()
    }

    /// Fire if nothing is outstanding and the join has not fired yet.
    pub fn fire_if_ready(&mut self) -> bool {
        if self.outstanding == 0 && !self.fired {
            self.fired = true;
            true
        } else {
            false
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn fired(&self) -> bool {
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_join_fires_once_on_check() {
        let mut join = PendingJoin::new();
        assert!(join.fire_if_ready());
        assert!(!join.fire_if_ready());
        assert!(join.fired());
    }

    #[test]
    fn fires_on_last_arrival_only() {
        let mut join = PendingJoin::new();
        for _ in 0..3 {
            join.register();
        }
        assert!(!join.fire_if_ready());
        assert!(!join.arrive());
        assert!(!join.arrive());
        assert_eq!(join.outstanding(), 1);
        assert!(join.arrive());
        assert_eq!(join.outstanding(), 0);
    }

    #[test]
    fn racing_entry_points_fire_once() {
        let mut join = PendingJoin::new();
        join.register();
        assert!(join.arrive());
        // The post-dispatch check and a stray arrival both lose.
        assert!(!join.fire_if_ready());
        assert!(!join.arrive());
        assert_eq!(join.outstanding(), 0);
    }
}
