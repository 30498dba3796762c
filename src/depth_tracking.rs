use crate::{
    error::{Error, Result},
    MAX_DEPTH,
};

/// Nesting depth reached while walking an encoded value.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct DepthTracker {
    depth: usize,
}

impl DepthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step into an array or object.
    pub fn enter(self) -> Result<Self> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::ParseLimit(format!(
                "nesting deeper than {} levels",
                MAX_DEPTH
            )));
        }
        Ok(Self {
            depth: self.depth + 1,
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}
