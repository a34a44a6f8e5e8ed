// BP (blitting processor) register block, as seen by the pixel pipeline.
//
// The GameCube's GX unit latches TEV, indirect texturing, and Z texture
// configuration into BP registers written through the command FIFO. This
// module models the subset of those registers that pixel shader constants
// are derived from. Each packed hardware word has a decoder so the register
// write path can store the raw value it received.

use crate::error::{PixelConstantsError, Result};

/// Maximum number of TEV stages.
pub const MAX_TEV_STAGES: usize = 16;
/// Number of texture map units.
pub const MAX_TEXTURE_MAPS: usize = 8;
/// Number of texture coordinate generators.
pub const MAX_TEXCOORDS: usize = 8;
/// Maximum number of indirect texture stages.
pub const MAX_INDIRECT_STAGES: usize = 4;
/// Number of indirect texture matrices.
pub const INDIRECT_MATRIX_COUNT: usize = 3;
/// Color register slots per bank (regular and konst).
pub const TEV_COLOR_SLOTS: usize = 4;

/// Sign-extend the low `bits` bits of `value`.
fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

// ---------------------------------------------------------------------------
// Gen mode
// ---------------------------------------------------------------------------

/// The stage counts from the GEN_MODE register.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GenMode {
    /// Number of active TEV stages minus one (4 bits).
    pub num_tev_stages: u8,
    /// Number of active indirect texture stages (3 bits).
    pub num_ind_stages: u8,
}

impl GenMode {
    /// Decode the stage counts from a raw GEN_MODE word.
    pub fn from_hex(hex: u32) -> Self {
        Self {
            num_tev_stages: ((hex >> 10) & 0xF) as u8,
            num_ind_stages: ((hex >> 16) & 0x7) as u8,
        }
    }

    /// Number of TEV stages the hardware actually runs.
    pub fn active_tev_stages(&self) -> usize {
        self.num_tev_stages as usize + 1
    }
}

// ---------------------------------------------------------------------------
// TEV order
// ---------------------------------------------------------------------------

/// Texture binding of a single TEV stage (one half of a RAS1_TREF register).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TevStageOrder {
    /// Texture map sampled by the stage.
    pub tex_map: u8,
    /// Texture coordinate generator feeding the lookup.
    pub tex_coord: u8,
    /// Whether the stage performs a texture lookup at all.
    pub enable: bool,
    /// Rasterized color channel selector.
    pub color_channel: u8,
}

impl TevStageOrder {
    fn from_bits(bits: u32) -> Self {
        Self {
            tex_map: (bits & 0x7) as u8,
            tex_coord: ((bits >> 3) & 0x7) as u8,
            enable: (bits >> 6) & 0x1 != 0,
            color_channel: ((bits >> 7) & 0x7) as u8,
        }
    }
}

// ---------------------------------------------------------------------------
// TEV color registers
// ---------------------------------------------------------------------------

/// Raw 8-bit components of a TEV color register.
///
/// The hardware splits each register over two words: the low word carries
/// red and alpha, the high word carries blue and green.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TevColorRegister {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl TevColorRegister {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Latch the low (red/alpha) word.
    pub fn set_low_hex(&mut self, hex: u32) {
        self.r = (hex & 0xFF) as u8;
        self.a = ((hex >> 12) & 0xFF) as u8;
    }

    /// Latch the high (blue/green) word.
    pub fn set_high_hex(&mut self, hex: u32) {
        self.b = (hex & 0xFF) as u8;
        self.g = ((hex >> 12) & 0xFF) as u8;
    }
}

// ---------------------------------------------------------------------------
// Indirect texturing
// ---------------------------------------------------------------------------

/// Source texture of one indirect stage (one entry of the IREF register).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndirectRef {
    pub tex_map: u8,
    pub tex_coord: u8,
}

/// Per-stage coordinate shift from the RAS1_SS registers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndirectTexScale {
    /// S shift (4 bits).
    pub shift_s: u8,
    /// T shift (4 bits).
    pub shift_t: u8,
}

impl IndirectTexScale {
    /// S coordinate scale, `1 / 2^shift_s`.
    pub fn scale_s(&self) -> f32 {
        1.0 / (1u32 << self.shift_s) as f32
    }

    /// T coordinate scale, `1 / 2^shift_t`.
    pub fn scale_t(&self) -> f32 {
        1.0 / (1u32 << self.shift_t) as f32
    }
}

/// One column of an indirect texture matrix.
///
/// Holds two signed 11-bit coefficients and a 2-bit slice of the matrix
/// exponent.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndMatrixColumn {
    pub m0: i16,
    pub m1: i16,
    pub scale_bits: u8,
}

impl IndMatrixColumn {
    pub fn from_hex(hex: u32) -> Self {
        Self {
            m0: sign_extend(hex & 0x7FF, 11) as i16,
            m1: sign_extend((hex >> 11) & 0x7FF, 11) as i16,
            scale_bits: ((hex >> 22) & 0x3) as u8,
        }
    }
}

/// A 2x3 indirect texture matrix.
///
/// Coefficient naming follows the hardware documentation: column 0 holds
/// `ma`/`mb`, column 1 holds `mc`/`md`, column 2 holds `me`/`mf`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndirectMatrix {
    pub columns: [IndMatrixColumn; 3],
}

impl IndirectMatrix {
    /// 6-bit exponent assembled from the per-column scale slices.
    pub fn exponent(&self) -> u32 {
        (self.columns[0].scale_bits as u32)
            | ((self.columns[1].scale_bits as u32) << 2)
            | ((self.columns[2].scale_bits as u32) << 4)
    }

    /// First row: `ma`, `mc`, `me`.
    pub fn row0(&self) -> [i16; 3] {
        [self.columns[0].m0, self.columns[1].m0, self.columns[2].m0]
    }

    /// Second row: `mb`, `md`, `mf`.
    pub fn row1(&self) -> [i16; 3] {
        [self.columns[0].m1, self.columns[1].m1, self.columns[2].m1]
    }
}

// ---------------------------------------------------------------------------
// Texture coordinates
// ---------------------------------------------------------------------------

/// Scale fields of a texture coordinate generator (SU_SSIZE / SU_TSIZE).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TexCoordScale {
    pub s_scale_minus_1: u16,
    pub t_scale_minus_1: u16,
}

impl TexCoordScale {
    pub fn scale_s(&self) -> f32 {
        (self.s_scale_minus_1 as u32 + 1) as f32
    }

    pub fn scale_t(&self) -> f32 {
        (self.t_scale_minus_1 as u32 + 1) as f32
    }
}

// ---------------------------------------------------------------------------
// Z texture
// ---------------------------------------------------------------------------

/// Packing of the depth value sampled by Z texturing (ZTEX2 type field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ZTextureFormat {
    Z8 = 0,
    Z16 = 1,
    Z24 = 2,
}

impl ZTextureFormat {
    /// Decode the 2-bit selector. The fourth encoding has no hardware
    /// meaning and is rejected.
    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Self::Z8),
            1 => Ok(Self::Z16),
            2 => Ok(Self::Z24),
            _ => Err(PixelConstantsError::InvalidZTextureFormat { raw }),
        }
    }
}

// ---------------------------------------------------------------------------
// Register block
// ---------------------------------------------------------------------------

/// BP register state read by the pixel constant manager.
///
/// The register write path owns this block and updates it before notifying
/// the [`PixelShaderManager`](crate::PixelShaderManager); the manager only
/// ever reads it.
#[derive(Debug, Clone)]
pub struct BpMemory {
    pub gen_mode: GenMode,
    /// Texture bindings, one per TEV stage.
    pub tev_orders: [TevStageOrder; MAX_TEV_STAGES],
    /// Color registers; index 0 is the regular bank, index 1 the konst bank.
    pub tev_colors: [[TevColorRegister; TEV_COLOR_SLOTS]; 2],
    pub ind_refs: [IndirectRef; MAX_INDIRECT_STAGES],
    pub ind_scales: [IndirectTexScale; MAX_INDIRECT_STAGES],
    pub ind_matrices: [IndirectMatrix; INDIRECT_MATRIX_COUNT],
    pub texcoords: [TexCoordScale; MAX_TEXCOORDS],
    /// Raw ZTEX2 type selector (2 bits).
    pub ztex_format: u8,
}

impl BpMemory {
    /// Power-on register state: a single TEV stage with no texture lookups.
    pub fn new() -> Self {
        Self {
            gen_mode: GenMode::default(),
            tev_orders: [TevStageOrder::default(); MAX_TEV_STAGES],
            tev_colors: [[TevColorRegister::default(); TEV_COLOR_SLOTS]; 2],
            ind_refs: [IndirectRef::default(); MAX_INDIRECT_STAGES],
            ind_scales: [IndirectTexScale::default(); MAX_INDIRECT_STAGES],
            ind_matrices: [IndirectMatrix::default(); INDIRECT_MATRIX_COUNT],
            texcoords: [TexCoordScale::default(); MAX_TEXCOORDS],
            ztex_format: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    // -- Raw register decoders -------------------------------------------

    pub fn set_gen_mode_hex(&mut self, hex: u32) {
        self.gen_mode = GenMode::from_hex(hex);
    }

    /// Decode a RAS1_TREF register, which carries stages `2 * index` and
    /// `2 * index + 1`.
    pub fn set_tev_order_hex(&mut self, index: usize, hex: u32) {
        self.tev_orders[index * 2] = TevStageOrder::from_bits(hex & 0xFFF);
        self.tev_orders[index * 2 + 1] = TevStageOrder::from_bits((hex >> 12) & 0xFFF);
    }

    /// Decode the IREF register (four 3-bit map/coord pairs).
    pub fn set_ind_ref_hex(&mut self, hex: u32) {
        for (stage, r) in self.ind_refs.iter_mut().enumerate() {
            let bits = hex >> (stage * 6);
            r.tex_map = (bits & 0x7) as u8;
            r.tex_coord = ((bits >> 3) & 0x7) as u8;
        }
    }

    /// Decode a RAS1_SS register, which carries two indirect stages.
    pub fn set_ind_scale_hex(&mut self, index: usize, hex: u32) {
        for half in 0..2 {
            let bits = hex >> (half * 8);
            self.ind_scales[index * 2 + half] = IndirectTexScale {
                shift_s: (bits & 0xF) as u8,
                shift_t: ((bits >> 4) & 0xF) as u8,
            };
        }
    }

    /// Decode one column word of indirect matrix `matrix`.
    pub fn set_ind_matrix_column_hex(&mut self, matrix: usize, column: usize, hex: u32) {
        self.ind_matrices[matrix].columns[column] = IndMatrixColumn::from_hex(hex);
    }

    /// Decode the ZTEX2 register; only the type field matters here.
    pub fn set_ztex2_hex(&mut self, hex: u32) {
        self.ztex_format = (hex & 0x3) as u8;
    }

    /// Texture binding of TEV stage `stage`.
    pub fn tev_order(&self, stage: usize) -> &TevStageOrder {
        &self.tev_orders[stage]
    }
}

impl Default for BpMemory {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
