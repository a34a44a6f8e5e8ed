// Integration tests for pixel constant change tracking
use gcvideo_pixel::bp::{BpMemory, TevColorRegister};
use gcvideo_pixel::{
    ColorBank, ConstantSink, ConstantSlot, PixelConstantsConfig, PixelConstantsError,
    PixelShaderManager, ShadowConstantBuffer,
};

type Pushes = Vec<(ConstantSlot, [f32; 4])>;

fn flush(manager: &mut PixelShaderManager, bp: &BpMemory) -> Pushes {
    let mut pushes = Pushes::new();
    manager
        .set_constants(bp, &mut pushes)
        .expect("valid register state");
    pushes
}

fn slots(pushes: &Pushes) -> Vec<ConstantSlot> {
    pushes.iter().map(|(slot, _)| *slot).collect()
}

fn assert_close(actual: [f32; 4], expected: [f32; 4]) {
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert!((a - e).abs() <= f32::EPSILON, "{actual:?} != {expected:?}");
    }
}

/// Stage `stage` samples `map` through `coord`.
fn enable_stage(bp: &mut BpMemory, stage: usize, map: u8, coord: u8) {
    let order = &mut bp.tev_orders[stage];
    order.tex_map = map;
    order.tex_coord = coord;
    order.enable = true;
}

#[test]
fn second_flush_without_setters_pushes_nothing() {
    let mut bp = BpMemory::new();
    bp.gen_mode.num_tev_stages = 1;
    enable_stage(&mut bp, 0, 0, 0);
    enable_stage(&mut bp, 1, 3, 1);
    bp.gen_mode.num_ind_stages = 4;

    let mut manager = PixelShaderManager::default();
    manager.notify_color_changed(&bp, ColorBank::Regular, 0);
    manager.notify_tex_dims_changed(3, 64, 64, 0, 0);
    assert!(!flush(&mut manager, &bp).is_empty());
    assert!(flush(&mut manager, &bp).is_empty());
    assert!(!manager.has_pending_changes());
}

#[test]
fn first_flush_after_init_covers_forced_categories() {
    let bp = BpMemory::new();
    let mut manager = PixelShaderManager::new(PixelConstantsConfig::default());
    let pushed = slots(&flush(&mut manager, &bp));
    for slot in [
        ConstantSlot::Alpha,
        ConstantSlot::ZBias,
        ConstantSlot::ZBiasOffset,
        ConstantSlot::IndTexScale0,
        ConstantSlot::IndTexMtx0,
        ConstantSlot::IndTexMtx1,
        ConstantSlot::IndTexMtx2,
        ConstantSlot::IndTexMtx3,
        ConstantSlot::IndTexMtx4,
        ConstantSlot::IndTexMtx5,
    ] {
        assert!(pushed.contains(&slot), "{slot:?} missing from {pushed:?}");
    }
}

#[test]
fn color_components_normalize_to_unit_range() {
    let mut bp = BpMemory::new();
    bp.tev_colors[0][1] = TevColorRegister::new(255, 128, 64, 0);
    let mut manager = PixelShaderManager::default();
    flush(&mut manager, &bp);

    manager.notify_color_changed(&bp, ColorBank::Regular, 1);
    let pushes = flush(&mut manager, &bp);
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].0, ConstantSlot::Color1);
    assert_close(pushes[0].1, [1.0, 0.501_960_8, 0.250_980_4, 0.0]);
}

#[test]
fn alpha_test_and_dest_alpha_pack_into_one_vector() {
    let bp = BpMemory::new();
    let mut manager = PixelShaderManager::default();
    flush(&mut manager, &bp);

    manager.notify_alpha_test_changed(0x00FF);
    manager.notify_dest_alpha_changed(0x80);
    let pushes = flush(&mut manager, &bp);
    assert_eq!(
        pushes,
        vec![(ConstantSlot::Alpha, [1.0, 0.0, 0.0, 128.0 / 255.0])]
    );
}

#[test]
fn z_bias_weights_follow_texture_format() {
    let ffrac = 255.0f32 / 256.0;
    let byte_weights = [ffrac / 65536.0, ffrac / 256.0, ffrac, 0.0];
    let cases = [
        (0, byte_weights),
        (1, [0.0, ffrac / 65536.0, ffrac / 256.0, ffrac]),
        (2, byte_weights),
    ];

    for (format, expected) in cases {
        let mut bp = BpMemory::new();
        bp.set_ztex2_hex(format);
        let mut manager = PixelShaderManager::default();
        let pushes = flush(&mut manager, &bp);
        let weights = pushes
            .iter()
            .find(|(slot, _)| *slot == ConstantSlot::ZBias)
            .map(|(_, v)| *v)
            .unwrap();
        assert_eq!(weights, expected, "format {format}");
    }
}

#[test]
fn out_of_range_z_format_is_reported() {
    let mut bp = BpMemory::new();
    bp.set_ztex2_hex(3);
    let mut manager = PixelShaderManager::default();
    let mut pushes = Pushes::new();
    let err = manager.set_constants(&bp, &mut pushes).unwrap_err();
    assert_eq!(err, PixelConstantsError::InvalidZTextureFormat { raw: 3 });
    assert!(pushes.is_empty());

    // Fixing the register lets the same pending state flush normally.
    bp.set_ztex2_hex(1);
    assert!(slots(&flush(&mut manager, &bp)).contains(&ConstantSlot::ZBias));
}

#[test]
fn texture_mask_change_skips_dims_when_none_pending() {
    let bp = BpMemory::new();
    let mut manager = PixelShaderManager::default();
    flush(&mut manager, &bp);

    manager.notify_textures_used_changed(0x0001_0101 << 2);
    assert_eq!(manager.texture_usage_mask(), 0x0001_0101 << 2);
    assert!(flush(&mut manager, &bp).is_empty());
}

#[test]
fn texture_mask_change_marks_dims_when_some_pending() {
    let bp = BpMemory::new();
    let mut manager = PixelShaderManager::default();
    flush(&mut manager, &bp);

    manager.notify_tex_dims_changed(0, 32, 32, 0, 0);
    manager.notify_textures_used_changed(1 << 6);
    assert_eq!(
        slots(&flush(&mut manager, &bp)),
        vec![ConstantSlot::TexDims0, ConstantSlot::TexDims6]
    );
}

#[test]
fn dropped_texture_unit_loses_its_texcoord() {
    let mut bp = BpMemory::new();
    bp.gen_mode.num_tev_stages = 1;
    enable_stage(&mut bp, 0, 1, 0);
    enable_stage(&mut bp, 1, 5, 2);
    let mut manager = PixelShaderManager::default();
    flush(&mut manager, &bp);
    assert_eq!(manager.map_to_coord(5), Some(2));

    bp.tev_orders[1].enable = false;
    let pushed = slots(&flush(&mut manager, &bp));
    assert_eq!(manager.map_to_coord(5), None);
    assert_eq!(manager.map_to_coord(1), Some(0));
    assert!(!pushed.contains(&ConstantSlot::TexDims5));
}

#[test]
fn newly_sampled_unit_waits_for_its_dims_setter() {
    let mut bp = BpMemory::new();
    let mut manager = PixelShaderManager::default();
    flush(&mut manager, &bp);

    // No dims pending: only the indirect scales are re-derived.
    enable_stage(&mut bp, 0, 4, 3);
    let pushes = flush(&mut manager, &bp);
    assert_eq!(slots(&pushes), vec![ConstantSlot::IndTexScale0]);
    assert!(pushes.iter().all(|(_, v)| v.iter().all(|c| c.is_finite())));
    assert_eq!(manager.map_to_coord(4), Some(3));

    manager.notify_tex_dims_changed(4, 64, 64, 0, 0);
    let pushes = flush(&mut manager, &bp);
    assert_eq!(slots(&pushes), vec![ConstantSlot::TexDims4]);
    assert_eq!(pushes[0].1, [1.0 / 64.0, 1.0 / 64.0, 1.0, 1.0]);
}

#[test]
fn stages_beyond_active_count_are_ignored() {
    let mut bp = BpMemory::new();
    enable_stage(&mut bp, 1, 7, 7);
    let mut manager = PixelShaderManager::default();
    flush(&mut manager, &bp);
    assert_eq!(manager.map_to_coord(7), None);
}

#[test]
fn shadow_buffer_collects_a_full_frame() {
    let mut bp = BpMemory::new();
    bp.tev_colors[1][0] = TevColorRegister::new(255, 255, 255, 255);
    let mut manager = PixelShaderManager::default();
    let mut shadow = ShadowConstantBuffer::new();

    manager.notify_color_changed(&bp, ColorBank::Konst, 0);
    manager.set_constants(&bp, &mut shadow).unwrap();
    manager.set_color_matrix(&mut shadow, &[0.0; 16], &[1.0; 4]);

    assert_eq!(shadow.get(ConstantSlot::KColor0), [1.0; 4]);
    assert_eq!(shadow.get(ConstantSlot::ColorMatrixAdd), [1.0; 4]);
    assert_eq!(shadow.take_dirty_range(), Some(4..32));
}

#[test]
fn sink_can_be_passed_as_trait_object() {
    let bp = BpMemory::new();
    let mut manager = PixelShaderManager::default();
    let mut pushes = Pushes::new();
    let sink: &mut dyn ConstantSink = &mut pushes;
    manager.set_constants(&bp, sink).unwrap();
    assert!(!pushes.is_empty());
}
