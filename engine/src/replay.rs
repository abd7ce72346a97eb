//! Replay - scrub through a fixed event log over a base snapshot.
//!
//! Backs the admin replay view: step forward and back, jump to a position,
//! or reset. The view at position `n` is always the base snapshot with the
//! first `n` events applied, whichever way the cursor got there.

use crate::{error::Result, view::CollectionView, ChangeEvent, Error, Record, SortSpec};

/// Cursor over an event log.
#[derive(Debug, Clone)]
pub struct Replay {
    base: Vec<Record>,
    log: Vec<ChangeEvent>,
    position: usize,
    view: CollectionView,
}

impl Replay {
    /// Create a cursor at position 0 (base snapshot only).
    pub fn new(order: SortSpec, base: Vec<Record>, log: Vec<ChangeEvent>) -> Self {
        let mut view = CollectionView::new(order);
        view.load(base.iter().cloned());
        Self {
            base,
            log,
            position: 0,
            view,
        }
    }

    /// Number of events applied so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Total number of events in the log.
    pub fn len(&self) -> usize {
        self.log.len()
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Check if every event has been applied.
    pub fn is_at_end(&self) -> bool {
        self.position == self.log.len()
    }

    /// View at the current position.
    pub fn view(&self) -> &CollectionView {
        &self.view
    }

    /// The most recently applied event.
    pub fn current_event(&self) -> Option<&ChangeEvent> {
        self.position.checked_sub(1).and_then(|i| self.log.get(i))
    }

    /// The full event log.
    pub fn events(&self) -> &[ChangeEvent] {
        &self.log
    }

    /// Apply the next event. Returns it, or `None` at the end of the log.
    pub fn step_forward(&mut self) -> Option<&ChangeEvent> {
        let event = self.log.get(self.position)?.clone();
        self.view.apply(event);
        self.position += 1;
        self.current_event()
    }

    /// Undo the last event. Returns false at the start of the log.
    pub fn step_back(&mut self) -> bool {
        match self.position.checked_sub(1) {
            Some(target) => {
                self.rebuild(target);
                true
            }
            None => false,
        }
    }

    /// Move to an absolute position in `0..=len`.
    pub fn seek(&mut self, position: usize) -> Result<()> {
        if position > self.log.len() {
            return Err(Error::ReplayOutOfRange {
                position,
                len: self.log.len(),
            });
        }
        if position >= self.position {
            while self.position < position {
                self.step_forward();
            }
        } else {
            self.rebuild(position);
        }
        Ok(())
    }

    /// Back to the base snapshot.
    pub fn reset(&mut self) {
        self.rebuild(0);
    }

    fn rebuild(&mut self, position: usize) {
        self.view.load(self.base.iter().cloned());
        for event in &self.log[..position] {
            self.view.apply(event.clone());
        }
        self.position = position;
    }
}
