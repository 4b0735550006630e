// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Build configuration.

/// Options for a single graph build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Remove empty forwarding blocks, merge straight-line blocks and
    /// dissolve regions that own nothing.
    pub pack: bool,
    /// Check graph invariants after building and panic on a violation.
    pub verify: bool,
    /// Fold constant operators while building operation trees.
    pub fold_constants: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            pack: true,
            verify: cfg!(debug_assertions),
            fold_constants: true,
        }
    }
}

impl BuildOptions {
    /// Unpacked and unverified; mostly useful for inspecting raw lowering.
    pub fn raw() -> Self {
        Self { pack: false, verify: false, ..Self::default() }
    }
}
