//! # 颜色计算模块
//!
//! ## 设计思路
//!
//! 纯函数集合：十六进制 ↔ RGB 互转，以及按不透明度做线性插值。
//! 解析失败用 `None` 表达（而非错误），调用方据此回退到默认点颜色。
//!
//! ## 实现思路
//!
//! - 使用 `once_cell::sync::Lazy` 预编译十六进制正则，首次调用后零成本复用。
//! - 混合模式建模为“枚举 → 混合函数”的映射，目前只实现 `Normal`，
//!   其余模式先回落到线性插值，作为后续扩展点。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// 6 位十六进制颜色，`#` 可选，大小写不敏感。
static HEX_COLOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#?([a-fA-F\d]{2})([a-fA-F\d]{2})([a-fA-F\d]{2})$").expect("十六进制颜色正则无效")
});

/// 低于该透明度的采样像素视为透明，映射为白色。
pub const TRANSPARENT_ALPHA_CUTOFF: u8 = 128;

/// 透明像素在采样网格中的替代色。
pub const TRANSPARENT_FALLBACK_HEX: &str = "#ffffff";

/// 8 位 RGB 三元组。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// 编码为小写、逐通道两位补零的 `#rrggbb`。
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// 解析 6 位十六进制颜色。
///
/// 非法输入（如 `"red"`、`"#12"`、`"#gggggg"`）返回 `None`。
///
/// # 示例
/// ```rust
/// use qr_pixel_match::pixel_match::{hex_to_rgb, Rgb};
///
/// assert_eq!(hex_to_rgb("#FFFFFF"), Some(Rgb::WHITE));
/// assert_eq!(hex_to_rgb("red"), None);
/// ```
pub fn hex_to_rgb(hex: &str) -> Option<Rgb> {
    let caps = HEX_COLOR.captures(hex)?;
    let channel = |i: usize| u8::from_str_radix(&caps[i], 16).ok();
    Some(Rgb::new(channel(1)?, channel(2)?, channel(3)?))
}

/// 将采样得到的 RGBA 转为十六进制颜色。
///
/// 透明度低于 50% 的像素不参与混合，直接视为白色背景。
pub fn rgba_to_hex(r: u8, g: u8, b: u8, a: u8) -> String {
    if a < TRANSPARENT_ALPHA_CUTOFF {
        return TRANSPARENT_FALLBACK_HEX.to_string();
    }
    Rgb::new(r, g, b).to_hex()
}

/// 逐通道线性插值：`round(a * opacity + b * (1 - opacity))`，四舍五入取半进一。
pub fn blend_rgb(a: Rgb, b: Rgb, opacity: f64) -> Rgb {
    let mix = |ca: u8, cb: u8| -> u8 {
        let value = f64::from(ca) * opacity + f64::from(cb) * (1.0 - opacity);
        value.round().clamp(0.0, 255.0) as u8
    };
    Rgb::new(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b))
}

/// 按不透明度混合两种十六进制颜色。
///
/// - `opacity == 1` 时原样返回 `color_a`（不经过解析与舍入）。
/// - 任一颜色无法解析时返回 `color_b`，即调用方配置的默认点颜色。
pub fn blend(color_a: &str, color_b: &str, opacity: f64) -> String {
    if opacity == 1.0 {
        return color_a.to_string();
    }

    match (hex_to_rgb(color_a), hex_to_rgb(color_b)) {
        (Some(a), Some(b)) => blend_rgb(a, b, opacity).to_hex(),
        _ => color_b.to_string(),
    }
}

/// 像素匹配的混合模式。
///
/// 仅 `Normal`（线性插值）已实现；其余模式目前与 `Normal` 等价。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Overlay,
    Screen,
}

/// 混合函数签名：`(采样色, 默认点颜色, 不透明度) -> 结果色`。
pub type BlendFn = fn(Rgb, Rgb, f64) -> Rgb;

impl BlendMode {
    /// 取得该模式对应的混合函数。
    pub fn blend_fn(self) -> BlendFn {
        match self {
            Self::Normal => blend_rgb,
            // TODO: 为 multiply / overlay / screen 实现各自的通道公式
            Self::Multiply | Self::Overlay | Self::Screen => blend_rgb,
        }
    }

    /// 是否有专属实现（而非回落到线性插值）。
    pub fn is_implemented(self) -> bool {
        matches!(self, Self::Normal)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Multiply => "multiply",
            Self::Overlay => "overlay",
            Self::Screen => "screen",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn hex_to_rgb_accepts_prefixed_and_bare_forms() {
        assert_eq!(hex_to_rgb("#000000"), Some(Rgb::BLACK));
        assert_eq!(hex_to_rgb("#ffffff"), Some(Rgb::WHITE));
        assert_eq!(hex_to_rgb("FF8000"), Some(Rgb::new(255, 128, 0)));
        assert_eq!(hex_to_rgb("#AbCdEf"), Some(Rgb::new(0xab, 0xcd, 0xef)));
    }

    #[test]
    fn hex_to_rgb_rejects_malformed_input() {
        for input in ["red", "#12", "#gggggg", "", "#1234567", "##123456", " #123456"] {
            assert_eq!(hex_to_rgb(input), None, "input={input:?}");
        }
    }

    #[test]
    fn rgba_to_hex_maps_translucent_pixels_to_white() {
        assert_eq!(rgba_to_hex(255, 0, 0, 255), "#ff0000");
        assert_eq!(rgba_to_hex(255, 0, 0, 128), "#ff0000");
        assert_eq!(rgba_to_hex(255, 0, 0, 127), "#ffffff");
        assert_eq!(rgba_to_hex(1, 2, 3, 0), "#ffffff");
    }

    #[test]
    fn blend_rounds_half_up() {
        assert_eq!(blend("#ff0000", "#000000", 0.5), "#800000");
    }

    #[test]
    fn blend_endpoints_are_exact() {
        assert_eq!(blend("#12ab34", "#fedcba", 1.0), "#12ab34");
        assert_eq!(blend("#12ab34", "#fedcba", 0.0), "#fedcba");
    }

    #[test]
    fn blend_falls_back_to_default_on_malformed_color() {
        assert_eq!(blend("not-a-color", "#102030", 0.4), "#102030");
        assert_eq!(blend("#102030", "oops", 0.4), "oops");
    }

    #[test]
    fn full_opacity_returns_input_verbatim() {
        assert_eq!(blend("#ABCDEF", "#000000", 1.0), "#ABCDEF");
    }

    #[test]
    fn unimplemented_modes_fall_back_to_linear_blend() {
        let a = Rgb::new(200, 100, 50);
        let b = Rgb::new(0, 0, 0);
        for mode in [BlendMode::Multiply, BlendMode::Overlay, BlendMode::Screen] {
            assert!(!mode.is_implemented());
            assert_eq!((mode.blend_fn())(a, b, 0.5), blend_rgb(a, b, 0.5));
        }
        assert!(BlendMode::Normal.is_implemented());
    }

    #[test]
    fn blend_mode_serde_uses_lowercase_names() {
        let mode: BlendMode = serde_json::from_str("\"screen\"").expect("parse blend mode");
        assert_eq!(mode, BlendMode::Screen);
        assert_eq!(serde_json::to_string(&BlendMode::Normal).expect("serialize"), "\"normal\"");
    }

    fn rgb_strategy() -> impl Strategy<Value = Rgb> {
        (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(r, g, b)| Rgb::new(r, g, b))
    }

    proptest! {
        #[test]
        fn blending_color_with_itself_is_identity(c in rgb_strategy(), opacity in 0.0f64..=1.0) {
            let hex = c.to_hex();
            prop_assert_eq!(hex_to_rgb(&blend(&hex, &hex, opacity)), Some(c));
        }

        #[test]
        fn blend_endpoints_hold_for_all_colors(a in rgb_strategy(), b in rgb_strategy()) {
            prop_assert_eq!(blend(&a.to_hex(), &b.to_hex(), 1.0), a.to_hex());
            prop_assert_eq!(blend(&a.to_hex(), &b.to_hex(), 0.0), b.to_hex());
        }

        #[test]
        fn hex_round_trips_through_rgb(c in rgb_strategy()) {
            prop_assert_eq!(hex_to_rgb(&c.to_hex()), Some(c));
        }
    }
}
