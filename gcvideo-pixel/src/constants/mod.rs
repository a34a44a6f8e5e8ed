// Pixel constant buffer layout and the sink that receives pushed constants.
//
// The generated pixel shader reads a fixed array of vec4 registers. Every
// register has a named slot here so the manager and the upload layer agree
// on the layout without passing raw indices around.

pub mod dirty;
pub mod shadow;

pub use dirty::DirtyMask;
pub use shadow::ShadowConstantBuffer;

/// Number of vec4 registers in the pixel constant buffer.
pub const CONSTANT_SLOT_COUNT: usize = 32;

/// A vec4 register of the pixel constant buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConstantSlot {
    Color0 = 0,
    Color1 = 1,
    Color2 = 2,
    Color3 = 3,
    KColor0 = 4,
    KColor1 = 5,
    KColor2 = 6,
    KColor3 = 7,
    Alpha = 8,
    TexDims0 = 9,
    TexDims1 = 10,
    TexDims2 = 11,
    TexDims3 = 12,
    TexDims4 = 13,
    TexDims5 = 14,
    TexDims6 = 15,
    TexDims7 = 16,
    /// Per-byte weights used to reassemble the sampled depth value.
    ZBias = 17,
    /// Sign-extended Z texture bias in `w`.
    ZBiasOffset = 18,
    IndTexScale0 = 19,
    IndTexScale1 = 20,
    IndTexMtx0 = 21,
    IndTexMtx1 = 22,
    IndTexMtx2 = 23,
    IndTexMtx3 = 24,
    IndTexMtx4 = 25,
    IndTexMtx5 = 26,
    ColorMatrix0 = 27,
    ColorMatrix1 = 28,
    ColorMatrix2 = 29,
    ColorMatrix3 = 30,
    /// Constant added after the color matrix.
    ColorMatrixAdd = 31,
}

impl ConstantSlot {
    /// All slots in register order.
    pub const ALL: [ConstantSlot; CONSTANT_SLOT_COUNT] = [
        Self::Color0,
        Self::Color1,
        Self::Color2,
        Self::Color3,
        Self::KColor0,
        Self::KColor1,
        Self::KColor2,
        Self::KColor3,
        Self::Alpha,
        Self::TexDims0,
        Self::TexDims1,
        Self::TexDims2,
        Self::TexDims3,
        Self::TexDims4,
        Self::TexDims5,
        Self::TexDims6,
        Self::TexDims7,
        Self::ZBias,
        Self::ZBiasOffset,
        Self::IndTexScale0,
        Self::IndTexScale1,
        Self::IndTexMtx0,
        Self::IndTexMtx1,
        Self::IndTexMtx2,
        Self::IndTexMtx3,
        Self::IndTexMtx4,
        Self::IndTexMtx5,
        Self::ColorMatrix0,
        Self::ColorMatrix1,
        Self::ColorMatrix2,
        Self::ColorMatrix3,
        Self::ColorMatrixAdd,
    ];

    /// Register index within the constant buffer.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    fn offset(self, n: usize) -> Self {
        Self::ALL[self.index() + n]
    }

    /// Color register `slot` (0..4) of `bank`.
    pub fn color(bank: ColorBank, slot: usize) -> Self {
        debug_assert!(slot < 4, "color slot {slot} out of range");
        bank.base_slot().offset(slot)
    }

    /// Texture dimensions of texture map `unit` (0..8).
    pub fn tex_dims(unit: usize) -> Self {
        debug_assert!(unit < 8, "texture unit {unit} out of range");
        Self::TexDims0.offset(unit)
    }

    /// Indirect scale register `half` (0 = stages 0/1, 1 = stages 2/3).
    pub fn ind_tex_scale(half: usize) -> Self {
        debug_assert!(half < 2, "indirect scale register {half} out of range");
        Self::IndTexScale0.offset(half)
    }

    /// Row `row` (0..2) of indirect matrix `matrix` (0..3).
    pub fn ind_tex_mtx(matrix: usize, row: usize) -> Self {
        debug_assert!(matrix < 3 && row < 2, "indirect matrix {matrix}/{row} out of range");
        Self::IndTexMtx0.offset(matrix * 2 + row)
    }

    /// Color matrix row `row` (0..4); row 4 is the constant-add vector.
    pub fn color_matrix(row: usize) -> Self {
        debug_assert!(row < 5, "color matrix row {row} out of range");
        Self::ColorMatrix0.offset(row)
    }
}

/// Which bank of TEV color registers a color belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ColorBank {
    /// TEV color registers.
    Regular = 0,
    /// Konst colors K0..K3.
    Konst = 1,
}

impl ColorBank {
    pub const ALL: [ColorBank; 2] = [Self::Regular, Self::Konst];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// First constant slot of the bank.
    pub const fn base_slot(self) -> ConstantSlot {
        match self {
            Self::Regular => ConstantSlot::Color0,
            Self::Konst => ConstantSlot::KColor0,
        }
    }
}

/// Receiver of pixel shader constants.
///
/// This is the only capability the constant manager needs from the graphics
/// API layer. Pushes are infallible here; upload failures are reported by
/// whatever eventually copies the data to the GPU.
pub trait ConstantSink {
    fn push_vector4(&mut self, slot: ConstantSlot, values: [f32; 4]);
}

impl<S: ConstantSink + ?Sized> ConstantSink for &mut S {
    fn push_vector4(&mut self, slot: ConstantSlot, values: [f32; 4]) {
        (**self).push_vector4(slot, values);
    }
}

/// Records pushes in order. Handy for debugging tools and tests.
impl ConstantSink for Vec<(ConstantSlot, [f32; 4])> {
    fn push_vector4(&mut self, slot: ConstantSlot, values: [f32; 4]) {
        self.push((slot, values));
    }
}
