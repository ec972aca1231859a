/// Configuration of a [`crate::tree::Tree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeOptions {
    /// Number given to the first committed version.
    pub initial_version: u64,

    /// Audit the whole tree after every `set` and `remove`.
    ///
    /// This is linear in the size of the tree and meant for tests and
    /// debugging sessions.
    pub check_invariants: bool,

    /// Slots preallocated when the tree builds its own [`crate::pool::NodePool`].
    pub pool_capacity: usize,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            initial_version: 1,
            check_invariants: false,
            pool_capacity: 0,
        }
    }
}

impl TreeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the first committed version. Zero is treated as one.
    pub fn with_initial_version(mut self, version: u64) -> Self {
        self.initial_version = version.max(1);
        self
    }

    pub fn with_invariant_checks(mut self, enabled: bool) -> Self {
        self.check_invariants = enabled;
        self
    }

    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = TreeOptions::default();

        assert_eq!(options.initial_version, 1);
        assert!(!options.check_invariants);
        assert_eq!(options.pool_capacity, 0);
    }

    #[test]
    fn test_builder() {
        let options = TreeOptions::new()
            .with_initial_version(0)
            .with_invariant_checks(true)
            .with_pool_capacity(1024);

        assert_eq!(options.initial_version, 1);
        assert!(options.check_invariants);
        assert_eq!(options.pool_capacity, 1024);
    }
}
