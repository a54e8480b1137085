//! Positional walk over the live and desired track lists
//!
//! The walk compares the destination playlist as it is (`live`) with the
//! track order it should have (`desired`), one position at a time:
//!
//! - same track at `p`: skip
//! - different track at `p`: delete it, then insert the desired track
//! - no live track at `p`: insert the desired track
//!
//! Once every desired position is handled, the live items past the end of
//! the desired list are deleted. Deletes at position `p` target index
//! `p - offset`, where `offset` counts the successful deletes so far;
//! cleanup deletes always target index `desired.len()`.
//!
//! The walk only decides what to do next. The caller performs each
//! [`WalkStep`] and reports the outcome with [`Walk::complete`].

/// Where the walk is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    Comparing,
    Deleting,
    Inserting,
    CleaningUp,
    Done,
}

/// Position bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub live_index: usize,
    pub desired_index: usize,
    pub offset: usize,
}

/// Next operation to perform against the destination playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStep {
    /// Track at `position` already matches
    Skip { position: usize },
    /// Remove the mismatching live item at `index`
    Delete { position: usize, index: usize },
    /// Insert `desired[position]`
    Insert { position: usize },
    /// Remove a surplus live item at `index`
    Cleanup { index: usize },
    Done,
}

/// State machine driving a reconciliation pass
#[derive(Debug)]
pub struct Walk<'a, T: PartialEq> {
    live: &'a [T],
    desired: &'a [T],
    state: WalkState,
    cursor: Cursor,
}

impl<'a, T: PartialEq> Walk<'a, T> {
    pub fn new(live: &'a [T], desired: &'a [T]) -> Self {
        Self {
            live,
            desired,
            state: WalkState::Comparing,
            cursor: Cursor::default(),
        }
    }

    pub fn state(&self) -> WalkState {
        self.state
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Decide the next step
    ///
    /// Skips advance the walk immediately. `Delete`, `Insert` and
    /// `Cleanup` are handed out again until [`complete`](Self::complete)
    /// is called.
    pub fn next_step(&mut self) -> WalkStep {
        loop {
            match self.state {
                WalkState::Comparing => {
                    let position = self.cursor.desired_index;
                    let Some(wanted) = self.desired.get(position) else {
                        self.cursor.live_index = self.desired.len();
                        self.state = WalkState::CleaningUp;
                        continue;
                    };

                    self.cursor.live_index = position;
                    return match self.live.get(position) {
                        Some(existing) if existing == wanted => {
                            self.cursor.desired_index += 1;
                            WalkStep::Skip { position }
                        }
                        Some(_) => {
                            self.state = WalkState::Deleting;
                            self.delete_step()
                        }
                        None => {
                            self.state = WalkState::Inserting;
                            WalkStep::Insert { position }
                        }
                    };
                }
                WalkState::Deleting => return self.delete_step(),
                WalkState::Inserting => {
                    return WalkStep::Insert {
                        position: self.cursor.desired_index,
                    }
                }
                WalkState::CleaningUp => {
                    if self.cursor.live_index >= self.live.len() {
                        self.state = WalkState::Done;
                        continue;
                    }
                    return WalkStep::Cleanup {
                        index: self.desired.len(),
                    };
                }
                WalkState::Done => return WalkStep::Done,
            }
        }
    }

    fn delete_step(&self) -> WalkStep {
        let position = self.cursor.desired_index;
        WalkStep::Delete {
            position,
            index: position.saturating_sub(self.cursor.offset),
        }
    }

    /// Record the outcome of the last `Delete`, `Insert` or `Cleanup`
    ///
    /// A failed step is not retried; the walk moves on.
    pub fn complete(&mut self, success: bool) {
        match self.state {
            WalkState::Deleting => {
                if success {
                    self.cursor.offset += 1;
                }
                self.state = WalkState::Inserting;
            }
            WalkState::Inserting => {
                self.cursor.desired_index += 1;
                self.cursor.live_index = self.cursor.desired_index;
                self.state = WalkState::Comparing;
            }
            WalkState::CleaningUp => {
                self.cursor.live_index += 1;
            }
            WalkState::Comparing | WalkState::Done => {}
        }
    }
}
