//! Component trait and presence masks

/// Marker trait for components
///
/// Stores default-construct a component on first add, so every component
/// type needs a [`Default`].
pub trait Component: Default + 'static {
    /// Stores of hierarchical components keep every parent's entry ahead of
    /// its children's and re-sort after removals.
    const HIERARCHICAL: bool = false;
}

/// Upper bound on distinct component types a single world can register.
pub const MAX_COMPONENT_TYPES: usize = 128;

/// One bit per registered component type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ComponentMask(u128);

impl ComponentMask {
    /// Mask with no bits set
    pub const EMPTY: Self = Self(0);

    /// Mask with only `bit` set
    pub const fn single(bit: usize) -> Self {
        Self(1u128 << bit)
    }

    /// Set `bit`
    pub fn insert(&mut self, bit: usize) {
        self.0 |= 1u128 << bit;
    }

    /// Clear `bit`
    pub fn remove(&mut self, bit: usize) {
        self.0 &= !(1u128 << bit);
    }

    /// Whether `bit` is set
    pub const fn has(self, bit: usize) -> bool {
        self.0 & (1u128 << bit) != 0
    }

    /// Whether every bit of `other` is also set here
    pub const fn contains_all(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two masks
    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether no bit is set
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate set bit positions, lowest first
    pub fn bits(self) -> impl Iterator<Item = usize> {
        (0..MAX_COMPONENT_TYPES).filter(move |&bit| self.has(bit))
    }
}
