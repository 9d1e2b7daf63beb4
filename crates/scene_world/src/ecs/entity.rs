//! Entity implementation

use std::fmt;

/// Entity identifier
///
/// Ids are handed out monotonically by a [`World`](super::World) and are
/// never recycled, so a stale id can only ever miss, not alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity {
    id: u32,
}

impl Entity {
    /// Reserved sentinel meaning "no entity"
    pub const INVALID: Self = Self { id: u32::MAX };

    /// Create an entity handle with the given raw ID
    pub const fn new(id: u32) -> Self {
        Self { id }
    }

    /// Get the entity ID
    pub const fn id(self) -> u32 {
        self.id
    }

    /// Whether this handle is something other than the sentinel
    pub const fn is_valid(self) -> bool {
        self.id != u32::MAX
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "#{}", self.id)
        } else {
            f.write_str("#invalid")
        }
    }
}
