//! # 位图重着色
//!
//! ## 设计思路
//!
//! 渲染器先按样式生成标准二维码位图，这里再原地改写“前景”像素的 RGB：
//! 每个模块取对应的采样色，与默认点颜色按不透明度混合后写回。
//! Alpha 通道、背景像素与位图尺寸保持不变，不做任何重新分配。
//!
//! ## 实现思路
//!
//! - 前景判定抽象为 `ForegroundClassifier`：
//!   - `RedThreshold`：红色通道低于阈值即视为前景（深色模块 + 浅色背景的兼容行为，默认）
//!   - `ModuleMaskClassifier`：直接使用渲染器给出的模块掩码，不依赖像素颜色
//! - 每个模块只计算一次混合色，再批量写入该模块矩形内的前景像素。
//! - 采样网格与模块数不一致时按比例换算索引，绝不越界读取。

use image::{Rgba, RgbaImage};

use super::color::{Rgb, hex_to_rgb};
use super::renderer::ModuleMask;
use super::{PixelData, QrStyleConfig};

/// 默认前景阈值：红色通道低于该值视为深色模块。
pub const DEFAULT_FOREGROUND_THRESHOLD: u8 = 128;

/// 判定位图像素是否属于前景模块。
pub trait ForegroundClassifier {
    fn is_foreground(
        &self,
        module_x: u32,
        module_y: u32,
        module_count: u32,
        pixel: &Rgba<u8>,
    ) -> bool;
}

/// 红色通道阈值判定。
///
/// 假设基础渲染为“浅色背景上的深色模块”；深色背景或抗锯齿边缘可能误判。
#[derive(Debug, Clone, Copy)]
pub struct RedThreshold(pub u8);

impl Default for RedThreshold {
    fn default() -> Self {
        Self(DEFAULT_FOREGROUND_THRESHOLD)
    }
}

impl ForegroundClassifier for RedThreshold {
    fn is_foreground(
        &self,
        _module_x: u32,
        _module_y: u32,
        _module_count: u32,
        pixel: &Rgba<u8>,
    ) -> bool {
        pixel[0] < self.0
    }
}

/// 基于渲染器模块掩码的判定。
#[derive(Debug, Clone, Copy)]
pub struct ModuleMaskClassifier<'a> {
    mask: &'a ModuleMask,
}

impl<'a> ModuleMaskClassifier<'a> {
    pub fn new(mask: &'a ModuleMask) -> Self {
        Self { mask }
    }
}

impl ForegroundClassifier for ModuleMaskClassifier<'_> {
    fn is_foreground(
        &self,
        module_x: u32,
        module_y: u32,
        module_count: u32,
        _pixel: &Rgba<u8>,
    ) -> bool {
        let size = self.mask.size();
        if module_count == 0 || size == 0 {
            return false;
        }
        if size == module_count {
            return self.mask.is_dark(module_x, module_y);
        }
        let mx = u64::from(module_x) * u64::from(size) / u64::from(module_count);
        let my = u64::from(module_y) * u64::from(size) / u64::from(module_count);
        self.mask.is_dark(mx as u32, my as u32)
    }
}

/// 单次重着色的统计信息。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecolorStats {
    pub module_count: u32,
    pub module_size: u32,
    pub pixels_recolored: u64,
    /// 采样色无法解析、改用默认点颜色的模块数。
    pub fallback_modules: u32,
}

/// 按样式边距计算模块几何：`(module_size, offset)`。
///
/// 边距按位图实际宽度与配置尺寸的比例换算。
pub fn module_geometry(bitmap_width: u32, style: &QrStyleConfig, module_count: u32) -> (u32, u32) {
    if module_count == 0 {
        return (0, 0);
    }

    let margin = if style.size == 0 || style.size == bitmap_width {
        style.margin
    } else {
        (u64::from(style.margin) * u64::from(bitmap_width) / u64::from(style.size)) as u32
    };

    let module_size = bitmap_width.saturating_sub(margin.saturating_mul(2)) / module_count;
    (module_size, margin)
}

/// 原地重着色，模块数取采样网格宽度，前景按红色阈值判定。
pub fn recolor(
    bitmap: &mut RgbaImage,
    pixel_data: &PixelData,
    style: &QrStyleConfig,
) -> RecolorStats {
    recolor_with(bitmap, pixel_data, style, pixel_data.width(), &RedThreshold::default())
}

/// 原地重着色的完整入口。
///
/// `module_count` 为位图上实际的模块网格边长；与 `pixel_data` 尺寸不同时按比例取色。
pub fn recolor_with<C>(
    bitmap: &mut RgbaImage,
    pixel_data: &PixelData,
    style: &QrStyleConfig,
    module_count: u32,
    classifier: &C,
) -> RecolorStats
where
    C: ForegroundClassifier + ?Sized,
{
    let mut stats = RecolorStats {
        module_count,
        ..RecolorStats::default()
    };

    let Some(dot) = hex_to_rgb(&style.dot_color) else {
        log::warn!("⚠️ 默认点颜色无法解析，跳过重着色：{}", style.dot_color);
        return stats;
    };

    let (width, height) = bitmap.dimensions();
    let (module_size, offset) = module_geometry(width, style, module_count);
    stats.module_size = module_size;
    if module_size == 0 {
        log::warn!(
            "⚠️ 位图 {}x{} 放不下 {} 个模块，跳过重着色",
            width,
            height,
            module_count
        );
        return stats;
    }

    let opacity = style.pixel_match_opacity;
    let blend = style.pixel_match_blending.blend_fn();

    for module_y in 0..module_count {
        for module_x in 0..module_count {
            let sampled = pixel_data
                .color_for_module(module_x, module_y, module_count)
                .and_then(hex_to_rgb);
            let blended = match sampled {
                Some(color) if opacity == 1.0 => color,
                Some(color) => blend(color, dot, opacity),
                None => {
                    stats.fallback_modules += 1;
                    dot
                }
            };

            let start_x = offset + module_x * module_size;
            let start_y = offset + module_y * module_size;
            let end_x = (start_x + module_size).min(width);
            let end_y = (start_y + module_size).min(height);

            for y in start_y..end_y {
                for x in start_x..end_x {
                    let pixel = bitmap.get_pixel_mut(x, y);
                    if classifier.is_foreground(module_x, module_y, module_count, pixel) {
                        write_rgb(pixel, blended);
                        stats.pixels_recolored += 1;
                    }
                }
            }
        }
    }

    log::debug!(
        "🖌️ 重着色完成 - 模块: {}x{} 模块尺寸: {}px 改写像素: {} 回退模块: {}",
        module_count,
        module_count,
        module_size,
        stats.pixels_recolored,
        stats.fallback_modules
    );

    stats
}

fn write_rgb(pixel: &mut Rgba<u8>, color: Rgb) {
    pixel[0] = color.r;
    pixel[1] = color.g;
    pixel[2] = color.b;
}
