//! # 配置模块
//!
//! ## 设计思路
//!
//! 配置分两类：
//! - `SamplerConfig`：运行时策略（体积上限、重采样滤镜、防抖间隔、缓存容量），
//!   由宿主注入，单次采样内使用同一份快照。
//! - `QrStyleConfig`：用户可见的样式记录。核心只读取其中与像素匹配相关的字段，
//!   其余字段原样交给渲染器。
//!
//! ## 实现思路
//!
//! - `SamplingProfile` 作为高层语义（sharp / balanced / smooth），映射到具体滤镜。
//! - `QrStyleConfig` 所有字段带默认值，局部 JSON 可直接覆盖默认配置。
//! - `validate` 在进入流水线前统一校验，失败返回 `InvalidConfig`。

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use super::color::{BlendMode, hex_to_rgb};
use super::PixelMatchError;

/// 像素匹配分辨率允许的上限。
pub const MAX_PIXEL_MATCH_RESOLUTION: u32 = 256;

/// 采样流水线配置。
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// 读取原始字节时允许的最大文件体积（字节）。
    pub max_file_size: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
    /// 缩放到模块网格时使用的滤镜，任一取值都是确定性的。
    pub resize_filter: FilterType,
    /// 输入变化后的防抖间隔（毫秒），突发输入合并为一次尾部执行。
    pub debounce_ms: u64,
    /// 采样结果缓存条目数，0 表示关闭缓存。
    pub sample_cache_entries: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            resize_filter: FilterType::Triangle,
            debounce_ms: 300,
            sample_cache_entries: 16,
        }
    }
}

/// 采样档位。
///
/// - `Sharp`：最近邻，色块边缘锐利
/// - `Balanced`：双线性
/// - `Smooth`：Lanczos3，颜色过渡最平滑
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingProfile {
    Sharp,
    Balanced,
    Smooth,
}

impl SamplingProfile {
    /// 从外部字符串解析档位。
    pub fn from_str(profile: &str) -> Result<Self, PixelMatchError> {
        match profile.trim().to_lowercase().as_str() {
            "sharp" => Ok(Self::Sharp),
            "balanced" => Ok(Self::Balanced),
            "smooth" => Ok(Self::Smooth),
            other => Err(PixelMatchError::InvalidConfig(format!(
                "未知采样档位：{}（可选：sharp / balanced / smooth）",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sharp => "sharp",
            Self::Balanced => "balanced",
            Self::Smooth => "smooth",
        }
    }
}

impl SamplerConfig {
    /// 应用指定档位到滤镜参数。
    pub fn apply_sampling_profile(&mut self, profile: SamplingProfile) {
        self.resize_filter = match profile {
            SamplingProfile::Sharp => FilterType::Nearest,
            SamplingProfile::Balanced => FilterType::Triangle,
            SamplingProfile::Smooth => FilterType::Lanczos3,
        };
    }

    /// 基于当前滤镜反推档位。
    pub fn infer_sampling_profile(&self) -> SamplingProfile {
        match self.resize_filter {
            FilterType::Nearest => SamplingProfile::Sharp,
            FilterType::Triangle => SamplingProfile::Balanced,
            _ => SamplingProfile::Smooth,
        }
    }
}

/// 点形状（交给渲染器）。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DotShape {
    #[default]
    Square,
    Dots,
    Rounded,
    ExtraRounded,
}

/// 定位角样式（交给渲染器）。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CornerEyeStyle {
    #[default]
    Square,
    Dot,
    ExtraRounded,
}

/// QR 样式配置。
///
/// 核心不拥有该记录，只在每个渲染周期读取快照。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QrStyleConfig {
    /// 编码进二维码的载荷。
    pub data: String,
    /// 渲染尺寸（像素，正方形边长）。
    pub size: u32,
    /// 边距（像素）。
    pub margin: u32,
    pub dot_color: String,
    pub background_color: String,
    pub background_transparent: bool,
    pub corner_eye_color: String,
    pub corner_eye_inner_color: String,
    pub dot_shape: DotShape,
    pub corner_eye_style: CornerEyeStyle,
    pub pixel_match_enabled: bool,
    /// 采样色与默认点颜色之间的插值权重，取值 `[0, 1]`。
    pub pixel_match_opacity: f64,
    pub pixel_match_blending: BlendMode,
    /// 目标模块数覆盖值；为空时按载荷长度估算。
    pub pixel_match_resolution: Option<u32>,
}

impl Default for QrStyleConfig {
    fn default() -> Self {
        Self {
            data: "https://example.com".to_string(),
            size: 300,
            margin: 10,
            dot_color: "#000000".to_string(),
            background_color: "#ffffff".to_string(),
            background_transparent: false,
            corner_eye_color: "#000000".to_string(),
            corner_eye_inner_color: "#000000".to_string(),
            dot_shape: DotShape::Square,
            corner_eye_style: CornerEyeStyle::Square,
            pixel_match_enabled: false,
            pixel_match_opacity: 0.8,
            pixel_match_blending: BlendMode::Normal,
            pixel_match_resolution: None,
        }
    }
}

impl QrStyleConfig {
    /// 解析（可能不完整的）JSON 配置，缺失字段取默认值。
    pub fn from_json_str(json: &str) -> Result<Self, PixelMatchError> {
        serde_json::from_str(json)
            .map_err(|e| PixelMatchError::InvalidConfig(format!("解析样式配置失败：{}", e)))
    }

    /// 校验配置不变量。
    pub fn validate(&self) -> Result<(), PixelMatchError> {
        let opacity = self.pixel_match_opacity;
        if !opacity.is_finite() || !(0.0..=1.0).contains(&opacity) {
            return Err(PixelMatchError::InvalidConfig(format!(
                "pixel_match_opacity 必须在 0~1 之间：{}",
                self.pixel_match_opacity
            )));
        }

        if let Some(resolution) = self.pixel_match_resolution {
            if !(1..=MAX_PIXEL_MATCH_RESOLUTION).contains(&resolution) {
                return Err(PixelMatchError::InvalidConfig(format!(
                    "pixel_match_resolution 必须在 1~{} 之间：{}",
                    MAX_PIXEL_MATCH_RESOLUTION, resolution
                )));
            }
        }

        if self.size == 0 || self.margin.saturating_mul(2) >= self.size {
            return Err(PixelMatchError::InvalidConfig(format!(
                "渲染尺寸 {} 不足以容纳两侧边距 {}",
                self.size, self.margin
            )));
        }

        for (name, value) in [
            ("dot_color", &self.dot_color),
            ("background_color", &self.background_color),
            ("corner_eye_color", &self.corner_eye_color),
            ("corner_eye_inner_color", &self.corner_eye_inner_color),
        ] {
            if hex_to_rgb(value).is_none() {
                return Err(PixelMatchError::InvalidConfig(format!(
                    "{} 不是合法的十六进制颜色：{}",
                    name, value
                )));
            }
        }

        Ok(())
    }

    /// 是否启用了与像素匹配冲突的高级样式。
    ///
    /// 像素匹配模式下渲染器只绘制方形模块，这些样式会被忽略。
    pub fn has_advanced_styling(&self) -> bool {
        self.dot_shape != DotShape::Square || self.corner_eye_style != CornerEyeStyle::Square
    }
}
