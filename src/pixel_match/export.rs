//! # 导出模块
//!
//! ## 设计思路
//!
//! 把最终位图序列化为图片文件。像素匹配是逐像素改色，矢量格式无法表达，
//! 因此像素匹配生效时只允许导出 PNG；标准模式下可由模块掩码生成 SVG。
//!
//! ## 实现思路
//!
//! - PNG 编码委托 `image` crate。
//! - 落盘文件名带 `chrono` 本地时间戳，避免覆盖。
//! - 目录不存在时自动创建。

use std::fmt::Write as _;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use chrono::Local;
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use super::recolor::module_geometry;
use super::renderer::{FinderRole, RenderedQr, finder_role};
use super::{PixelMatchError, QrStyleConfig};

/// 导出格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Png,
    Svg,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }
}

/// 校验当前模式下能否导出该格式。
pub fn ensure_export_supported(
    format: ExportFormat,
    pixel_match_active: bool,
) -> Result<(), PixelMatchError> {
    if format == ExportFormat::Svg && pixel_match_active {
        return Err(PixelMatchError::Export(
            "像素匹配模式下无法导出 SVG，请改用 PNG".to_string(),
        ));
    }
    Ok(())
}

/// 将位图编码为 PNG 字节。
pub fn export_png(bitmap: &RgbaImage) -> Result<Vec<u8>, PixelMatchError> {
    let mut cursor = Cursor::new(Vec::new());
    bitmap
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| PixelMatchError::Export(format!("PNG 编码失败：{}", e)))?;
    Ok(cursor.into_inner())
}

/// 由模块掩码生成 SVG（仅标准模式）。
pub fn export_svg(rendered: &RenderedQr, style: &QrStyleConfig) -> Result<String, PixelMatchError> {
    let (module_size, offset) = module_geometry(style.size, style, rendered.module_count);
    if module_size == 0 {
        return Err(PixelMatchError::Export("模块尺寸为 0，无法生成 SVG".to_string()));
    }

    let mut svg = String::new();
    let write_err = |_| PixelMatchError::Export("SVG 写入失败".to_string());

    write!(
        svg,
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{0}" height="{0}" "#,
            r#"viewBox="0 0 {0} {0}" shape-rendering="crispEdges">"#,
        ),
        style.size
    )
    .map_err(write_err)?;

    if !style.background_transparent {
        write!(
            svg,
            r#"<rect width="100%" height="100%" fill="{}"/>"#,
            style.background_color
        )
        .map_err(write_err)?;
    }

    // 与位图一致：定位图案外环与中心分别使用各自颜色
    let layers = [
        (None, &style.dot_color),
        (Some(FinderRole::Outer), &style.corner_eye_color),
        (Some(FinderRole::Inner), &style.corner_eye_inner_color),
    ];
    for (role, fill) in layers {
        write!(svg, r#"<path fill="{}" d=""#, fill).map_err(write_err)?;
        for my in 0..rendered.module_count {
            for mx in 0..rendered.module_count {
                if !rendered.mask.is_dark(mx, my)
                    || finder_role(mx, my, rendered.module_count) != role
                {
                    continue;
                }
                write!(
                    svg,
                    "M{} {}h{}v{}h-{}z",
                    offset + mx * module_size,
                    offset + my * module_size,
                    module_size,
                    module_size,
                    module_size
                )
                .map_err(write_err)?;
            }
        }
        svg.push_str(r#""/>"#);
    }
    svg.push_str("</svg>");

    Ok(svg)
}

/// 将位图保存为带时间戳的 PNG 文件，返回完整路径。
pub fn save_png(bitmap: &RgbaImage, dir: &Path) -> Result<PathBuf, PixelMatchError> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| {
            PixelMatchError::Export(format!("创建导出目录 '{}' 失败：{}", dir.display(), e))
        })?;
    }

    let timestamp = Local::now().format("%Y%m%d%H%M%S%f");
    let file_path = dir.join(format!("qr_{}.png", timestamp));

    bitmap
        .save_with_format(&file_path, ImageFormat::Png)
        .map_err(|e| PixelMatchError::Export(format!("保存图片失败：{}", e)))?;

    log::info!("💾 二维码已导出 - 路径: {}", file_path.display());
    Ok(file_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel_match::renderer::{ModuleQrRenderer, QrRenderer};
    use image::Rgba;

    #[test]
    fn svg_is_rejected_while_pixel_matching() {
        assert!(ensure_export_supported(ExportFormat::Png, true).is_ok());
        assert!(ensure_export_supported(ExportFormat::Svg, false).is_ok());
        assert!(matches!(
            ensure_export_supported(ExportFormat::Svg, true),
            Err(PixelMatchError::Export(_))
        ));
    }

    #[test]
    fn png_export_decodes_back_to_same_pixels() {
        let bitmap =
            RgbaImage::from_fn(7, 5, |x, y| Rgba([x as u8 * 30, y as u8 * 40, 9, 200]));
        let png = export_png(&bitmap).expect("encode png");

        let decoded = image::load_from_memory(&png).expect("decode png").to_rgba8();
        assert_eq!(decoded, bitmap);
    }

    #[test]
    fn save_png_creates_directory_and_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("exports").join("qr");
        let bitmap = RgbaImage::from_pixel(3, 3, Rgba([1, 2, 3, 255]));

        let path = save_png(&bitmap, &nested).expect("save png");

        assert!(path.starts_with(&nested));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
        assert!(path.exists());
    }

    #[test]
    fn svg_contains_one_square_per_dark_module() {
        let style = QrStyleConfig::default();
        let rendered = ModuleQrRenderer.render(&style).expect("render");

        let svg = export_svg(&rendered, &style).expect("svg");

        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches('M').count(), rendered.mask.dark_count());
        assert!(svg.contains(r##"fill="#ffffff""##));
    }

    #[test]
    fn svg_uses_corner_eye_colors_like_the_bitmap() {
        let style = QrStyleConfig {
            corner_eye_color: "#112233".into(),
            corner_eye_inner_color: "#445566".into(),
            ..QrStyleConfig::default()
        };
        let rendered = ModuleQrRenderer.render(&style).expect("render");
        let svg = export_svg(&rendered, &style).expect("svg");

        let path_for = |fill: &str| {
            let start = svg
                .find(&format!(r#"<path fill="{}" d=""#, fill))
                .expect("path present");
            let rest = &svg[start..];
            rest[..rest.find("/>").expect("path end")].to_string()
        };

        // 三个定位图案：外环各 24 个模块，中心各 9 个模块
        assert_eq!(path_for("#112233").matches('M').count(), 3 * 24);
        assert_eq!(path_for("#445566").matches('M').count(), 3 * 9);
        assert_eq!(
            path_for("#000000").matches('M').count(),
            rendered.mask.dark_count() - 3 * 33
        );
    }
}
