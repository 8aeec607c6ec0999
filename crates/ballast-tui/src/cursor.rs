//! Cursor variants for window content.

/// Where the cursor may sit within a window's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// No cursor; navigation keys are ignored.
    None,
    /// Any line in `0..len`.
    Free {
        /// Current line index.
        pos: usize,
    },
    /// Only the listed line indices are valid positions.
    Limited {
        /// Allowed indices, ascending.
        allowed: Vec<usize>,
        /// Index into `allowed`.
        idx: usize,
    },
}

impl Cursor {
    /// A free cursor at the first line.
    #[must_use]
    pub fn free() -> Self {
        Self::Free { pos: 0 }
    }

    /// A limited cursor snapped to the greatest allowed position at or
    /// below `requested` (or the first allowed position otherwise).
    #[must_use]
    pub fn limited(mut allowed: Vec<usize>, requested: usize) -> Self {
        allowed.sort_unstable();
        allowed.dedup();
        let idx = allowed
            .iter()
            .rposition(|&p| p <= requested)
            .unwrap_or(0);
        Self::Limited { allowed, idx }
    }

    /// The current line index, if the cursor exists.
    #[must_use]
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::None => None,
            Self::Free { pos } => Some(*pos),
            Self::Limited { allowed, idx } => allowed.get(*idx).copied(),
        }
    }

    /// Steps by `delta` lines (free) or allowed entries (limited),
    /// clamped to the content. Returns whether the position changed.
    pub fn step(&mut self, delta: isize, len: usize) -> bool {
        match self {
            Self::None => false,
            Self::Free { pos } => {
                if len == 0 {
                    return false;
                }
                let new = pos
                    .saturating_add_signed(delta)
                    .min(len - 1);
                let changed = new != *pos;
                *pos = new;
                changed
            }
            Self::Limited { allowed, idx } => {
                if allowed.is_empty() {
                    return false;
                }
                let new = idx
                    .saturating_add_signed(delta)
                    .min(allowed.len() - 1);
                let changed = new != *idx;
                *idx = new;
                changed
            }
        }
    }

    /// Jumps to the first valid position.
    pub fn first(&mut self) {
        match self {
            Self::None => {}
            Self::Free { pos } => *pos = 0,
            Self::Limited { idx, .. } => *idx = 0,
        }
    }

    /// Jumps to the last valid position.
    pub fn last(&mut self, len: usize) {
        match self {
            Self::None => {}
            Self::Free { pos } => *pos = len.saturating_sub(1),
            Self::Limited { allowed, idx } => {
                *idx = allowed.len().saturating_sub(1);
            }
        }
    }

    /// Moves to `target` if valid: exact for free cursors, snapped
    /// down to the nearest allowed position for limited ones.
    pub fn set(&mut self, target: usize, len: usize) -> bool {
        match self {
            Self::None => false,
            Self::Free { pos } => {
                if target >= len {
                    return false;
                }
                let changed = *pos != target;
                *pos = target;
                changed
            }
            Self::Limited { allowed, idx } => {
                let Some(new) = allowed.iter().rposition(|&p| p <= target)
                else {
                    return false;
                };
                let changed = *idx != new;
                *idx = new;
                changed
            }
        }
    }

    /// Re-clamps after a content change.
    pub fn clamp(&mut self, len: usize) {
        match self {
            Self::None => {}
            Self::Free { pos } => *pos = (*pos).min(len.saturating_sub(1)),
            Self::Limited { allowed, idx } => {
                allowed.retain(|&p| p < len);
                *idx = (*idx).min(allowed.len().saturating_sub(1));
            }
        }
    }
}
