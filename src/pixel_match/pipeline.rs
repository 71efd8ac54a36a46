//! # 解码与采样流水线
//!
//! ## 设计思路
//!
//! 将“字节 → 图像 → N×N RGBA → 十六进制网格”的过程集中管理，并在关键节点做资源上限控制。
//! 优先读 header 做尺寸检查，再进行完整解码，降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 读取 header 尺寸并按像素/内存上限快速拒绝
//! 2. 完整解码
//! 3. 缩放到目标网格（优先 `fast_image_resize`，失败回退 `image::resize_exact`）
//! 4. 逐像素转十六进制，透明度低于一半的像素记为白色

use fast_image_resize as fr;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageBuffer, Rgba, RgbaImage};
use std::io::Cursor;

use super::color::rgba_to_hex;
use super::source::RawImageData;
use super::{ImageSampler, PixelData, PixelMatchError, SamplerConfig};

impl ImageSampler {
    /// 将原始字节解码并降采样为颜色网格。
    pub(super) fn decode_to_pixel_data(
        &self,
        raw: RawImageData,
        target_size: u32,
        config: &SamplerConfig,
    ) -> Result<PixelData, PixelMatchError> {
        let (header_width, header_height) = Self::inspect_dimensions_from_memory(&raw.bytes)?;
        Self::validate_pixel_limits(config, header_width, header_height)?;
        Self::validate_decoded_memory_limits(config, header_width, header_height)?;

        let decoded = image::load_from_memory(&raw.bytes)
            .map_err(|e| PixelMatchError::Decode(format!("图片解码失败：{}", e)))?;

        let (raw_width, raw_height) = decoded.dimensions();
        Self::validate_pixel_limits(config, raw_width, raw_height)?;

        let grid = Self::resample_to_grid(decoded, target_size, config.resize_filter)?;

        let expected_len = (target_size as usize)
            .checked_mul(target_size as usize)
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or_else(|| PixelMatchError::ResourceLimit("采样网格尺寸溢出".to_string()))?;
        if grid.as_raw().len() != expected_len {
            return Err(PixelMatchError::Decode("采样后像素数据长度异常".to_string()));
        }

        let colors: Vec<Vec<String>> = grid
            .rows()
            .map(|row| row.map(|Rgba([r, g, b, a])| rgba_to_hex(*r, *g, *b, *a)).collect())
            .collect();

        log::info!(
            "🎨 图片已采样 - 来源: {} 原始尺寸: {}x{} 网格: {}x{}",
            raw.source_hint,
            raw_width,
            raw_height,
            target_size,
            target_size
        );

        PixelData::from_rows(colors)
    }

    /// 仅通过内存中的图片头信息读取宽高。
    fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), PixelMatchError> {
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PixelMatchError::Decode(format!("无法识别图片格式：{}", e)))?;

        reader
            .into_dimensions()
            .map_err(|e| PixelMatchError::Decode(format!("无法读取图片尺寸：{}", e)))
    }

    fn validate_pixel_limits(
        config: &SamplerConfig,
        width: u32,
        height: u32,
    ) -> Result<(), PixelMatchError> {
        let pixels = u64::from(width) * u64::from(height);

        if pixels > config.max_decoded_pixels {
            return Err(PixelMatchError::ResourceLimit(format!(
                "图片像素过大：{} 像素（限制：{} 像素）",
                pixels, config.max_decoded_pixels
            )));
        }

        Ok(())
    }

    fn validate_decoded_memory_limits(
        config: &SamplerConfig,
        width: u32,
        height: u32,
    ) -> Result<(), PixelMatchError> {
        let estimated = (u64::from(width) * u64::from(height))
            .checked_mul(4)
            .ok_or_else(|| PixelMatchError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

        if estimated > config.max_decoded_bytes {
            return Err(PixelMatchError::ResourceLimit(format!(
                "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
                estimated as f64 / 1024.0 / 1024.0,
                config.max_decoded_bytes as f64 / 1024.0 / 1024.0
            )));
        }

        Ok(())
    }

    /// 缩放到 `target_size × target_size`。
    fn resample_to_grid(
        image: DynamicImage,
        target_size: u32,
        filter: FilterType,
    ) -> Result<RgbaImage, PixelMatchError> {
        match Self::resize_with_fast_image_resize(&image, target_size, target_size, filter) {
            Ok(resized) => Ok(resized),
            Err(err) => {
                log::warn!(
                    "⚠️ fast_image_resize 采样失败，回退 image::resize_exact：{}",
                    err
                );
                Ok(image.resize_exact(target_size, target_size, filter).to_rgba8())
            }
        }
    }

    fn resize_with_fast_image_resize(
        image: &DynamicImage,
        target_width: u32,
        target_height: u32,
        filter: FilterType,
    ) -> Result<RgbaImage, PixelMatchError> {
        let src = image.to_rgba8();
        let (src_width, src_height) = src.dimensions();

        let src_image = fr::images::Image::from_vec_u8(
            src_width,
            src_height,
            src.into_raw(),
            fr::PixelType::U8x4,
        )
        .map_err(|e| PixelMatchError::Decode(format!("构建源图像缓冲失败：{}", e)))?;

        let mut dst_image =
            fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

        let mut resizer = fr::Resizer::new();
        let options = fr::ResizeOptions::new().resize_alg(Self::to_fast_alg(filter));

        resizer
            .resize(&src_image, &mut dst_image, Some(&options))
            .map_err(|e| PixelMatchError::Decode(format!("fast_image_resize 执行失败：{}", e)))?;

        ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(
            target_width,
            target_height,
            dst_image.into_vec(),
        )
        .ok_or_else(|| PixelMatchError::Decode("fast_image_resize 输出缓冲长度异常".to_string()))
    }

    /// `Nearest` 直接取源像素，保证纯色块采样后颜色不变。
    fn to_fast_alg(filter: FilterType) -> fr::ResizeAlg {
        match filter {
            FilterType::Nearest => fr::ResizeAlg::Nearest,
            FilterType::Triangle => fr::ResizeAlg::Convolution(fr::FilterType::Bilinear),
            FilterType::CatmullRom => fr::ResizeAlg::Convolution(fr::FilterType::CatmullRom),
            FilterType::Gaussian => fr::ResizeAlg::Convolution(fr::FilterType::Mitchell),
            FilterType::Lanczos3 => fr::ResizeAlg::Convolution(fr::FilterType::Lanczos3),
        }
    }
}
