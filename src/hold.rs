//! Last-known-good value with a hold timeout.
//!
//! Each consumer of an intermittent signal owns one `HeldValue` with its own
//! window, so the 2D overlay path and the avatar face box can tune how long
//! a stale value survives independently.

use std::time::Duration;

/// Outcome of feeding one frame's observation into a [`HeldValue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldState {
    /// A new value arrived this frame
    Fresh,
    /// No new value, the previous one is still within the window
    Held,
    /// No new value and the window was exceeded; the value was cleared this frame
    Expired,
    /// Nothing is held
    Empty,
}

/// A value that stays current for `window` after its last refresh
#[derive(Debug, Clone)]
pub struct HeldValue<T> {
    window: Duration,
    value: Option<T>,
    last_update: Option<Duration>,
}

impl<T> HeldValue<T> {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            value: None,
            last_update: None,
        }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Feed this frame's observation: `Some` refreshes, `None` ages the held value
    pub fn observe(&mut self, value: Option<T>, now: Duration) -> HoldState {
        match value {
            Some(value) => {
                self.refresh(value, now);
                HoldState::Fresh
            }
            None => self.age(now),
        }
    }

    /// Replace the held value and restart the window
    pub fn refresh(&mut self, value: T, now: Duration) {
        self.value = Some(value);
        self.last_update = Some(now);
    }

    /// Clear the value if the gap since the last refresh strictly exceeds the window
    pub fn age(&mut self, now: Duration) -> HoldState {
        if self.value.is_none() {
            return HoldState::Empty;
        }
        if self.gap(now).is_some_and(|gap| gap > self.window) {
            self.value = None;
            HoldState::Expired
        } else {
            HoldState::Held
        }
    }

    /// Time since the last refresh, `None` if never refreshed
    #[must_use]
    pub fn gap(&self, now: Duration) -> Option<Duration> {
        self.last_update.map(|last| now.saturating_sub(last))
    }

    #[must_use]
    pub fn current(&self) -> Option<&T> {
        self.value.as_ref()
    }

    #[must_use]
    pub fn last_update(&self) -> Option<Duration> {
        self.last_update
    }

    pub fn clear(&mut self) {
        self.value = None;
        self.last_update = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_empty_stays_empty() {
        let mut held: HeldValue<u32> = HeldValue::new(ms(100));
        assert_eq!(held.observe(None, ms(0)), HoldState::Empty);
        assert!(held.current().is_none());
    }

    #[test]
    fn test_hold_boundary() {
        let mut held = HeldValue::new(ms(600));
        assert_eq!(held.observe(Some(1), ms(1000)), HoldState::Fresh);
        assert_eq!(held.observe(None, ms(1599)), HoldState::Held);
        assert_eq!(held.observe(None, ms(1600)), HoldState::Held);
        assert_eq!(held.current(), Some(&1));
        assert_eq!(held.observe(None, ms(1601)), HoldState::Expired);
        assert!(held.current().is_none());
        assert_eq!(held.observe(None, ms(1602)), HoldState::Empty);
    }

    #[test]
    fn test_refresh_restarts_window() {
        let mut held = HeldValue::new(ms(100));
        held.observe(Some("a"), ms(0));
        held.observe(None, ms(90));
        held.observe(Some("b"), ms(95));
        assert_eq!(held.observe(None, ms(190)), HoldState::Held);
        assert_eq!(held.current(), Some(&"b"));
    }

    #[test]
    fn test_clock_going_backwards_is_not_expiry() {
        let mut held = HeldValue::new(ms(100));
        held.observe(Some(7), ms(500));
        assert_eq!(held.observe(None, ms(400)), HoldState::Held);
    }
}
