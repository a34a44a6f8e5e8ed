// Pixel shader constant manager.
//
// Caches the values derived from fixed-function GX state (TEV colors, alpha
// test, Z texture bias, texture dimensions, indirect texture scales and
// matrices) and pushes only the categories that changed since the previous
// draw into the pixel constant buffer. Register writes call the `notify_*`
// setters; the renderer calls `set_constants` once per draw.

use log::{debug, error, trace};

use crate::bp::{
    BpMemory, ZTextureFormat, INDIRECT_MATRIX_COUNT, MAX_INDIRECT_STAGES, MAX_TEXTURE_MAPS,
    TEV_COLOR_SLOTS,
};
use crate::config::PixelConstantsConfig;
use crate::constants::{ColorBank, ConstantSink, ConstantSlot, DirtyMask};
use crate::error::Result;

/// Texture mask bits belonging to texture map 0: non-power-of-two flag,
/// S repeat, T repeat. Shift left by the map index for other maps.
const TEXTURE_MASK_GROUP: u32 = 0x10101;

/// `255 / 256`, the weight of one depth byte.
const Z_BYTE_FRACTION: f32 = 255.0 / 256.0;

/// Constant cache and dirty tracker for the pixel stage.
///
/// All index arguments are preconditions: `slot < 4`, `unit < 8`,
/// `matrix < 3`. Violations are caller bugs and trip debug assertions.
#[derive(Debug, Clone)]
pub struct PixelShaderManager {
    config: PixelConstantsConfig,

    /// Normalized RGBA per bank and slot.
    colors: [[[f32; 4]; TEV_COLOR_SLOTS]; 2],
    colors_changed: [DirtyMask<TEV_COLOR_SLOTS>; 2],

    /// Alpha test reference values in bits 0..16, constant alpha in 16..24.
    alpha: u32,
    alpha_changed: bool,

    z_bias: u32,
    z_bias_changed: bool,

    /// Packed `width | height << 16 | wrap_s << 28 | wrap_t << 30` per map.
    tex_dims: [u32; MAX_TEXTURE_MAPS],
    tex_dims_changed: DirtyMask<MAX_TEXTURE_MAPS>,

    /// Bit `u` = map `u` is non-power-of-two, bit `8 + u` = S repeat,
    /// bit `16 + u` = T repeat.
    texture_mask: u32,

    /// Texcoord generator feeding each texture map in the current TEV setup.
    map_to_coord: [Option<u8>; MAX_TEXTURE_MAPS],
    map_to_coord_mask: u8,

    ind_tex_scale_changed: bool,
    ind_tex_mtx_changed: DirtyMask<INDIRECT_MATRIX_COUNT>,
}

impl PixelShaderManager {
    /// Create an initialized manager.
    pub fn new(config: PixelConstantsConfig) -> Self {
        let mut manager = Self {
            config,
            colors: [[[0.0; 4]; TEV_COLOR_SLOTS]; 2],
            colors_changed: [DirtyMask::new(); 2],
            alpha: 0,
            alpha_changed: false,
            z_bias: 0,
            z_bias_changed: false,
            tex_dims: [0; MAX_TEXTURE_MAPS],
            tex_dims_changed: DirtyMask::new(),
            texture_mask: 0,
            map_to_coord: [None; MAX_TEXTURE_MAPS],
            map_to_coord_mask: 0,
            ind_tex_scale_changed: false,
            ind_tex_mtx_changed: DirtyMask::new(),
        };
        manager.init();
        manager
    }

    /// Reset every cached value and mark the categories that have no
    /// setter-driven initial value as changed, so the next flush pushes
    /// alpha, Z bias, indirect scales and all indirect matrices.
    ///
    /// Colors and texture dimensions start clean; they become dirty through
    /// their setters.
    pub fn init(&mut self) {
        self.colors = [[[0.0; 4]; TEV_COLOR_SLOTS]; 2];
        self.colors_changed = [DirtyMask::new(); 2];
        self.alpha = 0;
        self.alpha_changed = true;
        self.z_bias = 0;
        self.z_bias_changed = true;
        self.tex_dims = [0; MAX_TEXTURE_MAPS];
        self.tex_dims_changed = DirtyMask::new();
        self.texture_mask = 0;
        self.map_to_coord = [None; MAX_TEXTURE_MAPS];
        self.map_to_coord_mask = 0;
        self.ind_tex_scale_changed = true;
        self.ind_tex_mtx_changed = DirtyMask::full();
        debug!("PixelShaderManager initialized");
    }

    /// Nothing is held beyond in-memory state.
    pub fn shutdown(&mut self) {
        debug!("PixelShaderManager shut down");
    }

    pub fn config(&self) -> &PixelConstantsConfig {
        &self.config
    }

    // -- Register write notifications ------------------------------------

    /// Latch color register `slot` of `bank` from the register block.
    pub fn notify_color_changed(&mut self, bp: &BpMemory, bank: ColorBank, slot: usize) {
        debug_assert!(slot < TEV_COLOR_SLOTS, "color slot {slot} out of range");
        let reg = &bp.tev_colors[bank.index()][slot];
        let rgba = [
            reg.r as f32 / 255.0,
            reg.g as f32 / 255.0,
            reg.b as f32 / 255.0,
            reg.a as f32 / 255.0,
        ];
        self.colors[bank.index()][slot] = rgba;
        self.colors_changed[bank.index()].mark(slot);
        if self.config.trace_pushes {
            trace!(
                "pixel {}color{}: {} {} {} {}",
                if bank == ColorBank::Konst { "k" } else { "" },
                slot,
                rgba[0],
                rgba[1],
                rgba[2],
                rgba[3]
            );
        }
    }

    /// Alpha compare register written; only the low 16 bits (the two
    /// reference values) matter.
    pub fn notify_alpha_test_changed(&mut self, value: u32) {
        let refs = value & 0xFFFF;
        if refs != self.alpha & 0xFFFF {
            self.alpha = (self.alpha & !0xFFFF) | refs;
            self.alpha_changed = true;
        }
    }

    /// Constant (destination) alpha written.
    pub fn notify_dest_alpha_changed(&mut self, alpha: u8) {
        if alpha as u32 != (self.alpha >> 16) & 0xFF {
            self.alpha = (self.alpha & !0x00FF_0000) | ((alpha as u32) << 16);
            self.alpha_changed = true;
        }
    }

    /// Texture `unit` was (re)bound with the given size and wrap modes.
    pub fn notify_tex_dims_changed(
        &mut self,
        unit: usize,
        width: u32,
        height: u32,
        wrap_s: u32,
        wrap_t: u32,
    ) {
        debug_assert!(unit < MAX_TEXTURE_MAPS, "texture unit {unit} out of range");
        let packed = (width & 0xFFFF)
            | ((height & 0xFFF) << 16)
            | ((wrap_s & 0x3) << 28)
            | ((wrap_t & 0x3) << 30);
        if self.tex_dims[unit] != packed {
            self.tex_dims[unit] = packed;
            self.tex_dims_changed.mark(unit);
        }
    }

    /// Z texture bias register written.
    pub fn notify_z_bias_changed(&mut self, bias: u32) {
        if self.z_bias != bias {
            self.z_bias = bias;
            self.z_bias_changed = true;
        }
    }

    /// The Z texture format selector may have changed independently of the
    /// bias value.
    pub fn notify_z_texture_op_changed(&mut self) {
        self.z_bias_changed = true;
    }

    /// Indirect stage count, reference table or scale registers written.
    /// Scales are rederived from scratch on the next flush.
    pub fn notify_indirect_scale_changed(&mut self) {
        self.ind_tex_scale_changed = true;
    }

    /// A coefficient or scale word of indirect matrix `matrix` written.
    pub fn notify_indirect_matrix_changed(&mut self, matrix: usize) {
        debug_assert!(matrix < INDIRECT_MATRIX_COUNT, "indirect matrix {matrix} out of range");
        self.ind_tex_mtx_changed.mark(matrix);
    }

    /// New per-map non-power-of-two / repeat flags from texture binding.
    ///
    /// A map whose flag group changed only gets its dimensions re-pushed if
    /// some texture dimensions are already pending this frame. Dimensions
    /// that no setter touched stay clean even though the flags that select
    /// their layout moved.
    pub fn notify_textures_used_changed(&mut self, mask: u32) {
        if self.texture_mask == mask {
            return;
        }
        let changed = self.texture_mask ^ mask;
        for unit in 0..MAX_TEXTURE_MAPS {
            if changed & (TEXTURE_MASK_GROUP << unit) != 0 && self.tex_dims_changed.is_any() {
                self.tex_dims_changed.mark(unit);
            }
        }
        self.texture_mask = mask;
    }

    /// The texcoord scale feeding map `unit` changed.
    ///
    /// Follows the same gate as [`notify_textures_used_changed`]: the map
    /// is only marked while other dimensions are already pending. Indirect
    /// scales always depend on texcoord scales, so they are marked
    /// unconditionally.
    ///
    /// [`notify_textures_used_changed`]: Self::notify_textures_used_changed
    pub fn notify_tex_dims_changed_due_to_coord_map(&mut self, unit: usize) {
        debug_assert!(unit < MAX_TEXTURE_MAPS, "texture unit {unit} out of range");
        if self.tex_dims_changed.is_any() {
            self.tex_dims_changed.mark(unit);
        }
        self.notify_indirect_scale_changed();
    }

    // -- Queries ---------------------------------------------------------

    /// Current non-power-of-two / repeat flags, used to pick shader variants.
    pub fn texture_usage_mask(&self) -> u32 {
        self.texture_mask
    }

    /// Packed dimension word cached for texture map `unit`.
    pub fn texture_dims(&self, unit: usize) -> u32 {
        self.tex_dims[unit]
    }

    /// Texcoord generator bound to map `unit` as of the last flush.
    pub fn map_to_coord(&self, unit: usize) -> Option<u8> {
        self.map_to_coord[unit]
    }

    /// Whether the next flush would push anything.
    pub fn has_pending_changes(&self) -> bool {
        self.colors_changed.iter().any(DirtyMask::is_any)
            || self.alpha_changed
            || self.z_bias_changed
            || self.tex_dims_changed.is_any()
            || self.ind_tex_scale_changed
            || self.ind_tex_mtx_changed.is_any()
    }

    // -- Flush -----------------------------------------------------------

    /// Derive and push every constant category marked as changed, then
    /// clear the marks.
    ///
    /// The Z texture format is validated before anything is pushed, so an
    /// invalid format leaves the sink untouched for this flush and the
    /// pending marks in place.
    pub fn set_constants<S: ConstantSink + ?Sized>(
        &mut self,
        bp: &BpMemory,
        sink: &mut S,
    ) -> Result<()> {
        let z_format = if self.z_bias_changed {
            match ZTextureFormat::from_raw(bp.ztex_format) {
                Ok(format) => Some(format),
                Err(err) => {
                    error!("Refusing to derive Z bias constants: {}", err);
                    return Err(err);
                }
            }
        } else {
            None
        };

        self.flush_colors(sink);
        self.update_map_to_coord(bp);
        self.flush_texture_dims(bp, sink);
        self.flush_alpha(sink);
        if let Some(format) = z_format {
            self.flush_z_bias(format, sink);
        }
        self.flush_indirect_scale(bp, sink);
        self.flush_indirect_matrices(bp, sink);
        Ok(())
    }

    /// Push the color matrix (four rows) and its constant-add vector.
    /// There is no caching; every call pushes all five registers.
    pub fn set_color_matrix<S: ConstantSink + ?Sized>(
        &self,
        sink: &mut S,
        matrix: &[f32; 16],
        const_add: &[f32; 4],
    ) {
        for (row, values) in matrix.chunks_exact(4).enumerate() {
            let values = [values[0], values[1], values[2], values[3]];
            self.push(sink, ConstantSlot::color_matrix(row), values);
        }
        self.push(sink, ConstantSlot::ColorMatrixAdd, *const_add);
    }

    fn push<S: ConstantSink + ?Sized>(&self, sink: &mut S, slot: ConstantSlot, values: [f32; 4]) {
        if self.config.trace_pushes {
            trace!(
                "{:?}: {} {} {} {}",
                slot,
                values[0],
                values[1],
                values[2],
                values[3]
            );
        }
        sink.push_vector4(slot, values);
    }

    fn flush_colors<S: ConstantSink + ?Sized>(&mut self, sink: &mut S) {
        for bank in ColorBank::ALL {
            let changed = self.colors_changed[bank.index()].take();
            for slot in changed.iter() {
                let rgba = self.colors[bank.index()][slot];
                self.push(sink, ConstantSlot::color(bank, slot), rgba);
            }
        }
    }

    /// Rebuild the map -> texcoord table from the active TEV stages.
    ///
    /// When the set of sampled maps changes, maps that dropped out lose their
    /// texcoord and maps still in use go through the same gated path as a
    /// texcoord scale change, which also re-derives the indirect scales.
    fn update_map_to_coord(&mut self, bp: &BpMemory) {
        let mut used: u8 = 0;
        for stage in 0..bp.gen_mode.active_tev_stages() {
            let order = bp.tev_order(stage);
            if order.enable {
                let map = order.tex_map as usize;
                self.map_to_coord[map] = Some(order.tex_coord);
                used |= 1 << map;
            }
        }

        if used != self.map_to_coord_mask {
            for unit in 0..MAX_TEXTURE_MAPS {
                if used & (1 << unit) != 0 {
                    self.notify_tex_dims_changed_due_to_coord_map(unit);
                } else {
                    self.map_to_coord[unit] = None;
                }
            }
            self.map_to_coord_mask = used;
        }
    }

    fn flush_texture_dims<S: ConstantSink + ?Sized>(&mut self, bp: &BpMemory, sink: &mut S) {
        let changed = self.tex_dims_changed.take();
        for unit in changed.iter() {
            let dims = self.texture_dims_vector(bp, unit);
            self.push(sink, ConstantSlot::tex_dims(unit), dims);
        }
    }

    /// Texture size and texcoord scale terms for map `unit`.
    ///
    /// Non-power-of-two maps get their size in texels (the shader wraps
    /// manually); power-of-two maps only need reciprocal terms.
    fn texture_dims_vector(&self, bp: &BpMemory, unit: usize) -> [f32; 4] {
        let dims = self.tex_dims[unit];
        let width = (dims & 0xFFFF) as f32;
        // The top four bits of the height half hold the wrap modes.
        let height = ((dims >> 16) & 0xFFF) as f32;
        let non_pow2 = self.texture_mask & (1 << unit) != 0;
        let coord = self.map_to_coord[unit].map(|tc| &bp.texcoords[tc as usize]);

        match (non_pow2, coord) {
            (true, Some(tc)) => [width, height, tc.scale_s() / width, tc.scale_t() / height],
            (true, None) => [width, height, 1.0, 1.0],
            (false, Some(tc)) => [
                tc.scale_s() / width,
                tc.scale_t() / height,
                1.0 / tc.scale_s(),
                1.0 / tc.scale_t(),
            ],
            (false, None) => [1.0, 1.0, 1.0 / width, 1.0 / height],
        }
    }

    fn flush_alpha<S: ConstantSink + ?Sized>(&mut self, sink: &mut S) {
        if !self.alpha_changed {
            return;
        }
        let alpha = self.alpha;
        let values = [
            (alpha & 0xFF) as f32 / 255.0,
            ((alpha >> 8) & 0xFF) as f32 / 255.0,
            0.0,
            ((alpha >> 16) & 0xFF) as f32 / 255.0,
        ];
        self.push(sink, ConstantSlot::Alpha, values);
        self.alpha_changed = false;
    }

    fn flush_z_bias<S: ConstantSink + ?Sized>(&mut self, format: ZTextureFormat, sink: &mut S) {
        self.push(sink, ConstantSlot::ZBias, z_bias_weights(format));
        // Sign-extend the 24-bit bias and scale it into [-0.5, 0.5).
        let bias = ((self.z_bias << 8) as i32 >> 8) as f32 / 16_777_216.0;
        self.push(sink, ConstantSlot::ZBiasOffset, [0.0, 0.0, 0.0, bias]);
        self.z_bias_changed = false;
    }

    /// Indirect stages sample their source map at texcoord scale divided by
    /// the source map size. Two stages share one register.
    fn flush_indirect_scale<S: ConstantSink + ?Sized>(&mut self, bp: &BpMemory, sink: &mut S) {
        if !self.ind_tex_scale_changed {
            return;
        }
        let stages = bp.gen_mode.num_ind_stages as usize;
        debug_assert!(
            stages <= MAX_INDIRECT_STAGES,
            "{stages} indirect stages configured"
        );
        let stages = stages.min(MAX_INDIRECT_STAGES);

        let mut scales = [0.0f32; 2 * MAX_INDIRECT_STAGES];
        for stage in 0..stages {
            let source = bp.ind_refs[stage];
            let tc = &bp.texcoords[source.tex_coord as usize];
            let ind_scale = &bp.ind_scales[stage];
            let dims = self.tex_dims[source.tex_map as usize];
            scales[2 * stage] = ind_scale.scale_s() * tc.scale_s() / (dims & 0xFFFF) as f32;
            // Masked to 12 bits: the top of the height half holds wrap modes.
            scales[2 * stage + 1] =
                ind_scale.scale_t() * tc.scale_t() / ((dims >> 16) & 0xFFF) as f32;
        }

        self.push(
            sink,
            ConstantSlot::ind_tex_scale(0),
            [scales[0], scales[1], scales[2], scales[3]],
        );
        if stages > 2 {
            self.push(
                sink,
                ConstantSlot::ind_tex_scale(1),
                [scales[4], scales[5], scales[6], scales[7]],
            );
        }
        self.ind_tex_scale_changed = false;
    }

    fn flush_indirect_matrices<S: ConstantSink + ?Sized>(&mut self, bp: &BpMemory, sink: &mut S) {
        let changed = self.ind_tex_mtx_changed.take();
        for index in changed.iter() {
            let matrix = &bp.ind_matrices[index];
            let fscale = indirect_matrix_scale(matrix.exponent());
            let [ma, mc, me] = matrix.row0();
            let [mb, md, mf] = matrix.row1();
            // w carries the dynamic matrix scale.
            self.push(
                sink,
                ConstantSlot::ind_tex_mtx(index, 0),
                [
                    ma as f32 * fscale,
                    mc as f32 * fscale,
                    me as f32 * fscale,
                    fscale * 256.0,
                ],
            );
            self.push(
                sink,
                ConstantSlot::ind_tex_mtx(index, 1),
                [
                    mb as f32 * fscale,
                    md as f32 * fscale,
                    mf as f32 * fscale,
                    fscale * 256.0,
                ],
            );
        }
    }
}

impl Default for PixelShaderManager {
    fn default() -> Self {
        Self::new(PixelConstantsConfig::default())
    }
}

/// Weights that reassemble a depth value from the sampled texel bytes.
fn z_bias_weights(format: ZTextureFormat) -> [f32; 4] {
    let ffrac = Z_BYTE_FRACTION;
    match format {
        ZTextureFormat::Z8 | ZTextureFormat::Z24 => {
            [ffrac / (256.0 * 256.0), ffrac / 256.0, ffrac, 0.0]
        }
        ZTextureFormat::Z16 => [0.0, ffrac / (256.0 * 256.0), ffrac / 256.0, ffrac],
    }
}

/// `2^(exponent - 17) / 1024`; coefficients are s.10 fixed point.
fn indirect_matrix_scale(exponent: u32) -> f32 {
    2.0f32.powi(exponent as i32 - 17) / 1024.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
