use std::mem;

/// Open compounds of a builder, innermost last.
///
/// Each open compound has a list of member offsets, relative to the compound's first byte. The
/// lists live in an arena keyed by nesting depth and are cleared rather than dropped, so a
/// builder that keeps opening compounds at the same depth stops allocating after warm-up.
#[derive(Clone, Debug, Default)]
pub(crate) struct BuilderStack {
    starts: Vec<usize>,
    index: Vec<Vec<usize>>,
}

impl BuilderStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a compound starting at `start`.
    pub fn push(&mut self, start: usize) {
        let depth = self.starts.len();
        self.starts.push(start);
        if self.index.len() <= depth {
            self.index.push(Vec::new());
        } else {
            self.index[depth].clear();
        }
    }

    pub fn pop(&mut self) -> Option<usize> {
        self.starts.pop()
    }

    /// Start offset of the innermost open compound.
    pub fn tos(&self) -> Option<usize> {
        self.starts.last().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.starts.len()
    }

    /// Member offsets of the innermost open compound.
    pub fn members(&self) -> &[usize] {
        match self.starts.len().checked_sub(1) {
            Some(depth) => &self.index[depth],
            None => &[],
        }
    }

    /// Record a new member of the innermost open compound.
    pub fn report(&mut self, offset: usize) {
        if let Some(depth) = self.starts.len().checked_sub(1) {
            self.index[depth].push(offset);
        }
    }

    /// Forget the most recent member of the innermost open compound.
    pub fn unreport(&mut self) -> Option<usize> {
        let depth = self.starts.len().checked_sub(1)?;
        self.index[depth].pop()
    }

    /// Keep only the first `len` members of the innermost open compound.
    pub fn truncate_members(&mut self, len: usize) {
        if let Some(depth) = self.starts.len().checked_sub(1) {
            self.index[depth].truncate(len);
        }
    }

    /// Borrow the innermost member list out of the arena. Hand it back with
    /// [`restore_members`](Self::restore_members) to keep its allocation.
    pub fn take_members(&mut self) -> Vec<usize> {
        match self.starts.len().checked_sub(1) {
            Some(depth) => mem::take(&mut self.index[depth]),
            None => Vec::new(),
        }
    }

    pub fn restore_members(&mut self, members: Vec<usize>) {
        if let Some(depth) = self.starts.len().checked_sub(1) {
            self.index[depth] = members;
        }
    }

    /// Close everything, keeping the arena.
    pub fn clear(&mut self) {
        self.starts.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn nesting() {
        let mut stack = BuilderStack::new();
        assert!(stack.is_empty());
        assert_eq!(stack.tos(), None);
        stack.push(0);
        stack.report(9);
        stack.push(10);
        stack.report(9);
        stack.report(12);
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.tos(), Some(10));
        assert_eq!(stack.members(), &[9, 12]);
        assert_eq!(stack.pop(), Some(10));
        assert_eq!(stack.members(), &[9]);
        assert_eq!(stack.unreport(), Some(9));
        assert_eq!(stack.unreport(), None);
    }

    #[test]
    fn truncate_members() {
        let mut stack = BuilderStack::new();
        stack.push(0);
        stack.report(9);
        stack.push(20);
        for offset in [9, 11, 15] {
            stack.report(offset);
        }
        stack.truncate_members(1);
        assert_eq!(stack.members(), &[9]);
        stack.truncate_members(4);
        assert_eq!(stack.members(), &[9]);
        stack.pop();
        assert_eq!(stack.members(), &[9]);
    }

    #[test]
    fn arena_is_reused() {
        let mut stack = BuilderStack::new();
        stack.push(0);
        for i in 0..100 {
            stack.report(i);
        }
        let members = stack.take_members();
        let cap = members.capacity();
        stack.restore_members(members);
        stack.pop();
        stack.push(5);
        assert!(stack.members().is_empty());
        assert_eq!(stack.take_members().capacity(), cap);
    }
}
