pub const EMERALD_DEEP: &str = "#002816";
pub const EMERALD_LITE: &str = "#004225";
pub const GOLD_METALLIC: &str = "#FFD700";
pub const GOLD_PALE: &str = "#F5E6BF";
pub const RED_VELVET: &str = "#580b0b";
pub const ACCENT_GLOW: &str = "#ffeebb";
pub const WHITE: &str = "#ffffff";

/// Background clear color behind the whole scene.
pub const BACKDROP: &str = "#001008";

/// Ornament colors: everything except the two foliage emeralds.
pub const ORNAMENT_CHOICES: [&str; 4] = [GOLD_METALLIC, GOLD_PALE, RED_VELVET, ACCENT_GLOW];

/// Gift wrap colors, cycled by index.
pub const GIFT_CYCLE: [&str; 4] = [RED_VELVET, GOLD_METALLIC, EMERALD_LITE, WHITE];

/// Parses a `#rrggbb` constant into linear-light RGBA ready for upload.
/// Only called on the fixed palette above, so a malformed value is a
/// programming error rather than a runtime condition.
pub fn linear_rgba(value: &str) -> [f32; 4] {
    let srgb = parse_hex_color(value).expect("palette color valid");
    [
        srgb_to_linear(srgb[0]),
        srgb_to_linear(srgb[1]),
        srgb_to_linear(srgb[2]),
        srgb[3],
    ]
}

fn parse_hex_color(value: &str) -> Option<[f32; 4]> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0])
}

fn srgb_to_linear(component: f32) -> f32 {
    if component <= 0.04045 {
        component / 12.92
    } else {
        ((component + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_full_palette() {
        for value in [
            EMERALD_DEEP,
            EMERALD_LITE,
            GOLD_METALLIC,
            GOLD_PALE,
            RED_VELVET,
            ACCENT_GLOW,
            WHITE,
            BACKDROP,
        ] {
            let rgba = linear_rgba(value);
            assert!(rgba.iter().all(|c| (0.0..=1.0).contains(c)));
            assert_eq!(rgba[3], 1.0);
        }
    }

    #[test]
    fn white_maps_to_linear_ones() {
        let rgba = linear_rgba(WHITE);
        for channel in &rgba[0..3] {
            assert!((channel - 1.0).abs() < 1e-6);
        }
    }
}
