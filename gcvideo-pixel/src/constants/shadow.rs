// CPU-side mirror of the pixel constant buffer.
//
// Pushed vectors land in a plain `[f32; 4]` array laid out exactly as the
// shader expects. The upload layer asks for the range of registers written
// since its last upload and copies those bytes with a single buffer write.

use std::ops::Range;

use super::{ConstantSink, ConstantSlot, CONSTANT_SLOT_COUNT};

/// Size of one vec4 register in bytes.
pub const REGISTER_SIZE: usize = std::mem::size_of::<[f32; 4]>();

#[derive(Debug, Clone)]
pub struct ShadowConstantBuffer {
    registers: [[f32; 4]; CONSTANT_SLOT_COUNT],
    /// Register range written since the last `take_dirty_range`.
    dirty: Option<Range<usize>>,
}

impl ShadowConstantBuffer {
    pub fn new() -> Self {
        Self {
            registers: [[0.0; 4]; CONSTANT_SLOT_COUNT],
            dirty: None,
        }
    }

    /// Current contents of `slot`.
    pub fn get(&self, slot: ConstantSlot) -> [f32; 4] {
        self.registers[slot.index()]
    }

    /// Register range written since the previous call, if any.
    pub fn take_dirty_range(&mut self) -> Option<Range<usize>> {
        self.dirty.take()
    }

    /// Whole buffer as raw bytes, ready for a uniform buffer write.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.registers)
    }

    /// Bytes covering the registers in `range`, together with their byte
    /// offset into the buffer.
    pub fn bytes_for(&self, range: Range<usize>) -> (usize, &[u8]) {
        let offset = range.start * REGISTER_SIZE;
        (offset, bytemuck::cast_slice(&self.registers[range]))
    }
}

impl Default for ShadowConstantBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantSink for ShadowConstantBuffer {
    fn push_vector4(&mut self, slot: ConstantSlot, values: [f32; 4]) {
        let index = slot.index();
        self.registers[index] = values;
        self.dirty = Some(match self.dirty.take() {
            Some(range) => range.start.min(index)..range.end.max(index + 1),
            None => index..index + 1,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_buffer_is_zeroed_and_clean() {
        let mut shadow = ShadowConstantBuffer::new();
        assert_eq!(shadow.as_bytes().len(), CONSTANT_SLOT_COUNT * REGISTER_SIZE);
        assert!(shadow.as_bytes().iter().all(|&b| b == 0));
        assert_eq!(shadow.take_dirty_range(), None);
    }

    #[test]
    fn dirty_range_spans_all_pushes() {
        let mut shadow = ShadowConstantBuffer::new();
        shadow.push_vector4(ConstantSlot::ZBias, [1.0; 4]);
        shadow.push_vector4(ConstantSlot::Alpha, [0.5; 4]);
        shadow.push_vector4(ConstantSlot::TexDims3, [2.0; 4]);
        assert_eq!(shadow.take_dirty_range(), Some(8..18));
        assert_eq!(shadow.take_dirty_range(), None);
    }

    #[test]
    fn pushed_values_are_readable() {
        let mut shadow = ShadowConstantBuffer::new();
        shadow.push_vector4(ConstantSlot::KColor2, [0.1, 0.2, 0.3, 0.4]);
        assert_eq!(shadow.get(ConstantSlot::KColor2), [0.1, 0.2, 0.3, 0.4]);
        assert_eq!(shadow.get(ConstantSlot::KColor1), [0.0; 4]);
    }

    #[test]
    fn bytes_for_range_has_matching_offset() {
        let mut shadow = ShadowConstantBuffer::new();
        shadow.push_vector4(ConstantSlot::Alpha, [1.0, 0.0, 0.0, 0.0]);
        let range = shadow.take_dirty_range().unwrap();
        let (offset, bytes) = shadow.bytes_for(range);
        assert_eq!(offset, 8 * REGISTER_SIZE);
        assert_eq!(bytes.len(), REGISTER_SIZE);
        assert_eq!(&bytes[..4], &1.0f32.to_ne_bytes());
    }
}
