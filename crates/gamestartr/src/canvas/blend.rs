use super::Rgba;

/// Source-over compositing of one straight-alpha RGBA pixel onto another.
pub(super) fn blend_pixel(dst: &mut [u8], src: Rgba, global_alpha: f32) {
    let src_alpha = (src[3] as f32 / 255.0) * global_alpha;
    if src_alpha <= 0.0 {
        return;
    }
    if src_alpha >= 1.0 {
        dst.copy_from_slice(&[src[0], src[1], src[2], 255]);
        return;
    }

    let dst_alpha = dst[3] as f32 / 255.0;
    let out_alpha = src_alpha + dst_alpha * (1.0 - src_alpha);
    if out_alpha <= 0.0 {
        return;
    }
    for channel in 0..3 {
        let blended = (src[channel] as f32 * src_alpha
            + dst[channel] as f32 * dst_alpha * (1.0 - src_alpha))
            / out_alpha;
        dst[channel] = blended.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8;
}
