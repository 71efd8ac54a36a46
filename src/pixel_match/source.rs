//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `ImageSource` 表示用户上传图片的来源语义
//! - `RawImageData` 表示已加载但未解码的字节
//! - `PixelData` 表示按模块网格采样后的颜色矩阵（不可变）

use std::path::PathBuf;

use bytes::Bytes;

use super::PixelMatchError;

/// 上传图片的输入来源。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// 内存中的原始字节（任意常见光栅格式）。
    Bytes(Bytes),
    /// Base64（支持 Data URL 与纯 Base64 字符串）。
    Base64(String),
    /// 本地文件路径来源。
    FilePath(PathBuf),
}

impl ImageSource {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "bytes",
            Self::Base64(_) => "base64",
            Self::FilePath(_) => "file",
        }
    }
}

/// 加载阶段输出：原始字节与来源标识。
pub(crate) struct RawImageData {
    /// 原始图片字节。
    pub(crate) bytes: Bytes,
    /// 来源提示（用于日志与诊断）。
    pub(crate) source_hint: &'static str,
}

/// 采样得到的颜色网格。
///
/// `colors` 为 `height` 行 × `width` 列的 `#rrggbb` 字符串，按行优先存放。
/// 构造后不可变；图片或分辨率变化时产生新实例。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelData {
    colors: Vec<Vec<String>>,
    width: u32,
    height: u32,
}

impl PixelData {
    /// 由行数据构造，并校验矩形不变量。
    pub fn from_rows(colors: Vec<Vec<String>>) -> Result<Self, PixelMatchError> {
        let height = colors.len();
        let width = colors.first().map(Vec::len).unwrap_or(0);

        if height == 0 || width == 0 {
            return Err(PixelMatchError::InvalidFormat("颜色网格不能为空".to_string()));
        }

        if let Some((row, cells)) = colors.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(PixelMatchError::InvalidFormat(format!(
                "颜色网格第 {} 行长度为 {}，期望 {}",
                row,
                cells.len(),
                width
            )));
        }

        let width = u32::try_from(width)
            .map_err(|_| PixelMatchError::ResourceLimit("颜色网格宽度溢出".to_string()))?;
        let height = u32::try_from(height)
            .map_err(|_| PixelMatchError::ResourceLimit("颜色网格高度溢出".to_string()))?;

        Ok(Self { colors, width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn colors(&self) -> &[Vec<String>] {
        &self.colors
    }

    pub fn color_at(&self, x: u32, y: u32) -> Option<&str> {
        self.colors
            .get(y as usize)
            .and_then(|row| row.get(x as usize))
            .map(String::as_str)
    }

    /// 取模块 `(module_x, module_y)` 对应的采样色。
    ///
    /// 按 `floor(module / module_count * 网格边长)` 换算，网格大小与模块数不一致时
    /// 也不会越界；模块坐标超出 `module_count` 时返回 `None`。
    pub fn color_for_module(
        &self,
        module_x: u32,
        module_y: u32,
        module_count: u32,
    ) -> Option<&str> {
        if module_count == 0 || module_x >= module_count || module_y >= module_count {
            return None;
        }

        let pixel_x = u64::from(module_x) * u64::from(self.width) / u64::from(module_count);
        let pixel_y = u64::from(module_y) * u64::from(self.height) / u64::from(module_count);
        self.color_at(pixel_x as u32, pixel_y as u32)
    }
}
