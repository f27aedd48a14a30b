//! Mixer helpers: wet/dry blending, peak normalization, soft clipping.

/// Peak level the offline render normalizes to.
pub const NORMALIZE_PEAK: f32 = 0.99;

/// Blend `wet` into `dry` in place: `dry * (1 - level) + wet * level`.
pub fn mix_wet_dry(dry: &mut [f32], wet: &[f32], level: f32) {
    for (d, &w) in dry.iter_mut().zip(wet.iter()) {
        *d = *d * (1.0 - level) + w * level;
    }
}

/// Scale all channels so the loudest sample equals `target`.
///
/// Silent input is left untouched. Returns the gain that was applied.
pub fn peak_normalize(channels: &mut [Vec<f32>], target: f32) -> f32 {
    let peak = channels
        .iter()
        .flat_map(|c| c.iter())
        .fold(0.0f32, |acc, &s| acc.max(s.abs()));
    if peak <= 0.0 || !peak.is_finite() {
        return 1.0;
    }
    let gain = target / peak;
    for channel in channels.iter_mut() {
        for s in channel.iter_mut() {
            *s *= gain;
        }
    }
    gain
}

/// Soft clipper using tanh.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    x.tanh()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wet_dry_blend() {
        let mut dry = vec![1.0, 0.0, -1.0];
        mix_wet_dry(&mut dry, &[0.0, 1.0, 1.0], 0.25);
        assert!((dry[0] - 0.75).abs() < 1e-6);
        assert!((dry[1] - 0.25).abs() < 1e-6);
        assert!((dry[2] - (-0.5)).abs() < 1e-6);
    }

    #[test]
    fn normalizes_to_target_peak() {
        let mut ch = vec![vec![0.2, -0.5], vec![0.1, 0.25]];
        let gain = peak_normalize(&mut ch, NORMALIZE_PEAK);
        assert!((gain - 1.98).abs() < 1e-5);
        assert!((ch[0][1] + NORMALIZE_PEAK).abs() < 1e-6);
        assert!((ch[1][1] - 0.495).abs() < 1e-6);
    }

    #[test]
    fn silence_is_not_normalized() {
        let mut ch = vec![vec![0.0; 16]];
        assert_eq!(peak_normalize(&mut ch, NORMALIZE_PEAK), 1.0);
        assert!(ch[0].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn soft_clip_bounded() {
        assert!(soft_clip(100.0) <= 1.0);
        assert!(soft_clip(-100.0) >= -1.0);
        assert!((soft_clip(0.0)).abs() < 1e-9);
    }
}
