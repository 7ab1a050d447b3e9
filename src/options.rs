//! Per-call configuration for diff and patch.

/// Default maximum nesting depth for diff and patch traversal.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Options passed explicitly to every diff and patch call.
///
/// # Example
///
/// ```
/// use shapediff::Options;
///
/// let options = Options::default().with_omit_unequal(true).with_max_depth(64);
/// assert!(options.omit_unequal);
/// assert!(options.slice_ordering);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Patch only where the target still holds the recorded `from` value.
    /// Default: false
    pub omit_unequal: bool,
    /// Never synthesize absent map entries or nil containers while patching.
    /// Default: false
    pub no_create: bool,
    /// Compare sequences by index. When false, sequences are compared as
    /// multisets and reordering alone produces no changes.
    /// Default: true
    pub slice_ordering: bool,
    /// Maximum nesting depth for traversal and change paths.
    /// Default: 512
    pub max_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            omit_unequal: false,
            no_create: false,
            slice_ordering: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Options {
    /// Create options with every field given.
    pub fn new(
        omit_unequal: bool,
        no_create: bool,
        slice_ordering: bool,
        max_depth: usize,
    ) -> Self {
        Self {
            omit_unequal,
            no_create,
            slice_ordering,
            max_depth,
        }
    }

    /// Patch only unchanged locations and never create missing ones.
    pub fn strict() -> Self {
        Self {
            omit_unequal: true,
            no_create: true,
            ..Self::default()
        }
    }

    /// Compare sequences as multisets; patch without conflict checks.
    pub fn lenient() -> Self {
        Self {
            slice_ordering: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_omit_unequal(mut self, omit_unequal: bool) -> Self {
        self.omit_unequal = omit_unequal;
        self
    }

    #[must_use]
    pub fn with_no_create(mut self, no_create: bool) -> Self {
        self.no_create = no_create;
        self
    }

    #[must_use]
    pub fn with_slice_ordering(mut self, slice_ordering: bool) -> Self {
        self.slice_ordering = slice_ordering;
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let strict = Options::strict();
        assert!(strict.omit_unequal && strict.no_create && strict.slice_ordering);
        let lenient = Options::lenient();
        assert!(!lenient.slice_ordering && !lenient.omit_unequal);
        assert_eq!(Options::default().max_depth, DEFAULT_MAX_DEPTH);
    }
}
