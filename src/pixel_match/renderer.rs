//! # 渲染器协作方
//!
//! ## 设计思路
//!
//! 二维码符号本身的编码与绘制不属于像素匹配核心，这里只定义边界：
//! `QrRenderer` 按样式产出位图，同时给出真实模块数与模块掩码，
//! 让重着色阶段可以用真实网格对齐，而不是依赖估算值或像素颜色猜测。
//!
//! ## 实现思路
//!
//! 默认实现 `ModuleQrRenderer` 借助 `qrcode` 完成编码（纠错等级 Q、字节模式），
//! 再按 `margin + 模块索引 * 模块尺寸` 绘制方形模块，几何与重着色阶段完全一致。
//! 透明背景使用 alpha 为 0 的背景色，阈值判定仍会把它当作背景。

use image::{Rgba, RgbaImage};
use qrcode::{Color, EcLevel, QrCode};

use super::color::{Rgb, hex_to_rgb};
use super::recolor::module_geometry;
use super::{PixelMatchError, QrStyleConfig};

/// 模块掩码：`true` 表示深色（数据）模块。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleMask {
    modules: Vec<Vec<bool>>,
    size: u32,
}

impl ModuleMask {
    pub fn from_rows(modules: Vec<Vec<bool>>) -> Result<Self, PixelMatchError> {
        let size = modules.len();
        if size == 0 || modules.iter().any(|row| row.len() != size) {
            return Err(PixelMatchError::Render("模块掩码必须是非空正方形".to_string()));
        }
        let size = u32::try_from(size)
            .map_err(|_| PixelMatchError::Render("模块掩码尺寸溢出".to_string()))?;
        Ok(Self { modules, size })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn is_dark(&self, x: u32, y: u32) -> bool {
        self.modules
            .get(y as usize)
            .and_then(|row| row.get(x as usize))
            .copied()
            .unwrap_or(false)
    }

    pub fn dark_count(&self) -> usize {
        self.modules.iter().flatten().filter(|dark| **dark).count()
    }
}

/// 一次渲染的产物。
#[derive(Debug, Clone)]
pub struct RenderedQr {
    pub bitmap: RgbaImage,
    /// 渲染器实际使用的模块网格边长。
    pub module_count: u32,
    pub mask: ModuleMask,
}

/// 渲染器边界。
pub trait QrRenderer: Send + Sync {
    fn render(&self, style: &QrStyleConfig) -> Result<RenderedQr, PixelMatchError>;
}

/// 基于 `qrcode` 的方形模块渲染器。
#[derive(Debug, Clone, Copy, Default)]
pub struct ModuleQrRenderer;

impl ModuleQrRenderer {
    fn encode(data: &str) -> Result<ModuleMask, PixelMatchError> {
        let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::Q)
            .map_err(|e| PixelMatchError::Render(format!("二维码编码失败：{}", e)))?;
        let width = code.width();
        let colors = code.to_colors();

        let modules = colors
            .chunks(width)
            .map(|row| row.iter().map(|c| *c == Color::Dark).collect())
            .collect();
        ModuleMask::from_rows(modules)
    }

    fn parse_color(name: &str, value: &str) -> Result<Rgb, PixelMatchError> {
        hex_to_rgb(value).ok_or_else(|| {
            PixelMatchError::InvalidConfig(format!("{} 不是合法的十六进制颜色：{}", name, value))
        })
    }
}

/// 模块在定位图案中的角色。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FinderRole {
    /// 外环，使用 `corner_eye_color`。
    Outer,
    /// 中心 3×3，使用 `corner_eye_inner_color`。
    Inner,
}

/// 判断模块是否落在三个定位图案内。
pub(super) fn finder_role(x: u32, y: u32, size: u32) -> Option<FinderRole> {
    let local = if x < 7 && y < 7 {
        (x, y)
    } else if x + 7 >= size && y < 7 {
        (x + 7 - size, y)
    } else if x < 7 && y + 7 >= size {
        (x, y + 7 - size)
    } else {
        return None;
    };
    let inner = (2..=4).contains(&local.0) && (2..=4).contains(&local.1);
    Some(if inner { FinderRole::Inner } else { FinderRole::Outer })
}

impl QrRenderer for ModuleQrRenderer {
    fn render(&self, style: &QrStyleConfig) -> Result<RenderedQr, PixelMatchError> {
        let mask = Self::encode(&style.data)?;
        let module_count = mask.size();

        let (module_size, offset) = module_geometry(style.size, style, module_count);
        if module_size == 0 {
            return Err(PixelMatchError::Render(format!(
                "渲染尺寸 {}px（边距 {}px）放不下 {} 个模块",
                style.size, style.margin, module_count
            )));
        }

        let dot = Self::parse_color("dot_color", &style.dot_color)?;
        let background = Self::parse_color("background_color", &style.background_color)?;
        let eye = Self::parse_color("corner_eye_color", &style.corner_eye_color)?;
        let eye_inner = Self::parse_color("corner_eye_inner_color", &style.corner_eye_inner_color)?;

        let background_alpha = if style.background_transparent { 0 } else { 255 };
        let mut bitmap = RgbaImage::from_pixel(
            style.size,
            style.size,
            Rgba([background.r, background.g, background.b, background_alpha]),
        );

        if style.has_advanced_styling() {
            log::debug!("方形模块渲染器忽略高级样式（点形状/定位角样式）");
        }

        for my in 0..module_count {
            for mx in 0..module_count {
                if !mask.is_dark(mx, my) {
                    continue;
                }
                let color = match finder_role(mx, my, module_count) {
                    Some(FinderRole::Inner) => eye_inner,
                    Some(FinderRole::Outer) => eye,
                    None => dot,
                };
                let pixel = Rgba([color.r, color.g, color.b, 255]);

                let start_x = offset + mx * module_size;
                let start_y = offset + my * module_size;
                for y in start_y..start_y + module_size {
                    for x in start_x..start_x + module_size {
                        bitmap.put_pixel(x, y, pixel);
                    }
                }
            }
        }

        log::debug!(
            "🔳 二维码已渲染 - 模块: {}x{} 模块尺寸: {}px 位图: {}x{}",
            module_count,
            module_count,
            module_size,
            style.size,
            style.size
        );

        Ok(RenderedQr {
            bitmap,
            module_count,
            mask,
        })
    }
}
