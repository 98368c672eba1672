//! Single-assignment outcome slot.

/// Holds the outcome of an operation. The first write wins; later writes
/// are handed back to the caller and never replace the stored value.
#[derive(Debug)]
pub struct Settlement<T> {
    value: Option<T>,
    settled: bool,
}

impl<T> Settlement<T> {
    pub fn new() -> Self {
        Self {
            value: None,
            settled: false,
        }
    }

    /// Store `value` unless already settled, in which case it is returned.
    pub fn settle(&mut self, value: T) -> Result<(), T> {
        if self.settled {
            return Err(value);
        }
        self.settled = true;
        self.value = Some(value);
        Ok(())
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Take the outcome for delivery. The slot stays settled afterwards.
    pub fn take(&mut self) -> Option<T> {
        self.value.take()
    }
}

impl<T> Default for Settlement<T> {
    fn default() -> Self {
        Self::new()
    }
}
