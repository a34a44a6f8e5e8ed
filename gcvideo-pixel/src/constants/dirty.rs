// Fixed-width dirty bitsets for the constant categories that track changes
// per slot (color registers, texture maps, indirect matrices).

/// Up to eight dirty bits, one per slot of a constant category.
///
/// `N` is the number of slots; bits at or above `N` are never set.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirtyMask<const N: usize> {
    bits: u8,
}

impl<const N: usize> DirtyMask<N> {
    const FULL: u8 = if N >= 8 { 0xFF } else { (1u8 << N) - 1 };

    /// A mask with no slot dirty.
    pub const fn new() -> Self {
        Self { bits: 0 }
    }

    /// A mask with every slot dirty.
    pub const fn full() -> Self {
        Self { bits: Self::FULL }
    }

    pub fn is_dirty(&self, slot: usize) -> bool {
        debug_assert!(slot < N, "dirty slot {slot} out of range (width {N})");
        self.bits & (1 << slot) != 0
    }

    pub fn mark(&mut self, slot: usize) {
        debug_assert!(slot < N, "dirty slot {slot} out of range (width {N})");
        self.bits |= 1 << slot;
    }

    pub fn mark_all(&mut self) {
        self.bits = Self::FULL;
    }

    pub fn clear(&mut self, slot: usize) {
        debug_assert!(slot < N, "dirty slot {slot} out of range (width {N})");
        self.bits &= !(1 << slot);
    }

    pub fn clear_all(&mut self) {
        self.bits = 0;
    }

    /// Whether any slot is dirty.
    pub fn is_any(&self) -> bool {
        self.bits != 0
    }

    /// Raw bit pattern, slot `i` at bit `i`.
    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// Dirty slots in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> {
        let bits = self.bits;
        (0..N).filter(move |&slot| bits & (1 << slot) != 0)
    }

    /// Return the current mask and clear it.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}
