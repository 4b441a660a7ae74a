// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LineBuffer (C5): a fixed-capacity ring of recent [`LogLine`]s kept for
//! `Supervisor::recentLines`. Owned by a single `Supervisor`, so no
//! synchronisation beyond `&mut self` is required.

use devsup_core::LogLine;
use std::collections::VecDeque;

pub struct LineBuffer {
    capacity: usize,
    lines: VecDeque<LogLine>,
}

impl LineBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), lines: VecDeque::with_capacity(capacity) }
    }

    pub fn add(&mut self, line: LogLine) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// The most recent `n` lines, oldest first. `n` larger than the buffer
    /// simply returns everything held.
    pub fn recent(&self, n: usize) -> Vec<LogLine> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
