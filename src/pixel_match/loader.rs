//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源（内存字节 / Base64 / 本地文件）的原始字节加载，
//! 并在“尽可能早”的阶段执行输入校验，尽快失败，减少不必要的内存与 CPU 消耗。
//!
//! ## 实现思路
//!
//! - 字节：体积校验 + 文件签名校验。
//! - Base64：Data URL / 纯 Base64 解析 + 解码前体积估算。
//! - 文件：存在性 + metadata 体积限制 + 读取；读不到统一映射为 `Read`。

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use std::path::Path;

use super::source::RawImageData;
use super::{ImageSampler, ImageSource, PixelMatchError, SamplerConfig};

impl ImageSampler {
    /// 按来源加载原始字节。
    pub(super) fn load_source(
        &self,
        source: ImageSource,
        config: &SamplerConfig,
    ) -> Result<RawImageData, PixelMatchError> {
        log::debug!("📥 开始加载图片 - 来源: {}", source.kind());
        match source {
            ImageSource::Bytes(bytes) => Self::load_from_bytes(bytes, config),
            ImageSource::Base64(data) => Self::load_from_base64(&data, config),
            ImageSource::FilePath(path) => Self::load_from_file(&path, config),
        }
    }

    fn load_from_bytes(
        bytes: Bytes,
        config: &SamplerConfig,
    ) -> Result<RawImageData, PixelMatchError> {
        Self::validate_file_size(bytes.len() as u64, config)?;
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "bytes",
        })
    }

    /// 从 Base64 字符串加载图片原始字节。
    fn load_from_base64(
        data: &str,
        config: &SamplerConfig,
    ) -> Result<RawImageData, PixelMatchError> {
        let bytes = Self::parse_base64_with_limit(data, config.max_file_size)?;
        Self::validate_file_size(bytes.len() as u64, config)?;
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes: Bytes::from(bytes),
            source_hint: "base64",
        })
    }

    /// 从本地路径加载图片原始字节。
    fn load_from_file(
        path: &Path,
        config: &SamplerConfig,
    ) -> Result<RawImageData, PixelMatchError> {
        log::info!("📁 开始读取本地图片 - 路径: {}", path.display());

        if !path.exists() {
            return Err(PixelMatchError::Read(format!("文件不存在：{}", path.display())));
        }

        let metadata = std::fs::metadata(path)
            .map_err(|e| PixelMatchError::Read(format!("无法读取文件信息：{}", e)))?;
        Self::validate_file_size(metadata.len(), config)?;

        let bytes = std::fs::read(path)
            .map_err(|e| PixelMatchError::Read(format!("无法读取图片文件：{}", e)))?;
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes: Bytes::from(bytes),
            source_hint: "file",
        })
    }

    fn validate_file_size(len: u64, config: &SamplerConfig) -> Result<(), PixelMatchError> {
        if len > config.max_file_size {
            return Err(PixelMatchError::ResourceLimit(format!(
                "图片体积过大：{:.2} MB（限制：{:.2} MB）",
                len as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }
        Ok(())
    }

    fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> Result<u64, PixelMatchError> {
        let len = base64_data.trim().len() as u64;
        let groups = len
            .checked_add(3)
            .ok_or_else(|| PixelMatchError::ResourceLimit("Base64 输入长度溢出".to_string()))?
            / 4;

        groups
            .checked_mul(3)
            .ok_or_else(|| PixelMatchError::ResourceLimit("Base64 解码体积估算溢出".to_string()))
    }

    /// 解析 Base64 输入（支持 `data:image/...;base64,` 前缀与纯 Base64）。
    pub(super) fn parse_base64_with_limit(
        data: &str,
        max_file_size: u64,
    ) -> Result<Vec<u8>, PixelMatchError> {
        let normalized = data.trim();

        let payload = if normalized.starts_with("data:") {
            let base64_start = normalized
                .find(";base64,")
                .ok_or_else(|| PixelMatchError::InvalidFormat("缺少 base64 标记".to_string()))?;
            &normalized[base64_start + 8..]
        } else {
            normalized
        };

        let estimated_len = Self::estimate_base64_decoded_upper_bound_len(payload)?;
        if estimated_len > max_file_size {
            return Err(PixelMatchError::ResourceLimit(format!(
                "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
                estimated_len as f64 / 1024.0 / 1024.0,
                max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| PixelMatchError::Decode(format!("Base64 解码失败：{}", e)))
    }

    /// 通过文件签名（magic bytes）校验输入是否为图片。
    ///
    /// `infer` 与 `image` 任一识别为图片即放行，保证 `image` 能解码的格式（如 PPM、QOI）不被误拒。
    fn validate_image_signature(bytes: &[u8]) -> Result<(), PixelMatchError> {
        if bytes.is_empty() {
            return Err(PixelMatchError::Decode("图片内容为空".to_string()));
        }

        if image::guess_format(bytes).is_ok() {
            return Ok(());
        }

        match infer::get(bytes) {
            Some(kind) if kind.matcher_type() == infer::MatcherType::Image => Ok(()),
            Some(kind) => Err(PixelMatchError::Decode(format!(
                "文件签名不是图片类型：{}",
                kind.mime_type()
            ))),
            None => Err(PixelMatchError::Decode("无法识别图片类型".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel_match::sampler::test_support::solid_png;
    use std::io::Write;

    #[test]
    fn base64_data_url_and_bare_payload_decode_identically() {
        let png = solid_png(2, 2, [1, 2, 3, 255]);
        let encoded = general_purpose::STANDARD.encode(&png);
        let data_url = format!("data:image/png;base64,{}", encoded);

        let from_url =
            ImageSampler::parse_base64_with_limit(&data_url, u64::MAX).expect("data url");
        let from_bare = ImageSampler::parse_base64_with_limit(&encoded, u64::MAX).expect("bare");

        assert_eq!(from_url, png);
        assert_eq!(from_bare, png);
    }

    #[test]
    fn data_url_without_base64_marker_is_rejected() {
        let result = ImageSampler::parse_base64_with_limit("data:image/png,abcd", u64::MAX);
        assert!(matches!(result, Err(PixelMatchError::InvalidFormat(_))));
    }

    #[test]
    fn parse_base64_with_limit_rejects_large_payload_before_decode() {
        let payload = "A".repeat(4096);
        let result = ImageSampler::parse_base64_with_limit(&payload, 128);
        assert!(matches!(result, Err(PixelMatchError::ResourceLimit(_))));
    }

    #[test]
    fn invalid_base64_is_decode_error() {
        let result = ImageSampler::parse_base64_with_limit("@@@@", u64::MAX);
        assert!(matches!(result, Err(PixelMatchError::Decode(_))));
    }

    #[test]
    fn load_rejects_non_image_payload() {
        let sampler = ImageSampler::new(SamplerConfig::default());
        let config = sampler.config_snapshot().expect("config");
        let payload = Bytes::from_static(b"%PDF-1.7 definitely not an image");

        let result = sampler.load_source(ImageSource::Bytes(payload), &config);
        assert!(matches!(result, Err(PixelMatchError::Decode(_))));
    }

    #[test]
    fn load_rejects_empty_payload() {
        let sampler = ImageSampler::new(SamplerConfig::default());
        let config = sampler.config_snapshot().expect("config");

        let result = sampler.load_source(ImageSource::Bytes(Bytes::new()), &config);
        assert!(matches!(result, Err(PixelMatchError::Decode(_))));
    }

    #[test]
    fn missing_file_is_read_error() {
        let sampler = ImageSampler::new(SamplerConfig::default());
        let config = sampler.config_snapshot().expect("config");
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing.png");

        let result = sampler.load_source(ImageSource::FilePath(path), &config);
        assert!(matches!(result, Err(PixelMatchError::Read(_))));
    }

    #[test]
    fn file_over_size_limit_is_rejected() {
        let mut config = SamplerConfig::default();
        config.max_file_size = 16;
        let sampler = ImageSampler::new(config);
        let config = sampler.config_snapshot().expect("config");

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(&solid_png(8, 8, [0, 0, 0, 255])).expect("write png");

        let result = sampler.load_source(ImageSource::FilePath(file.path().to_path_buf()), &config);
        assert!(matches!(result, Err(PixelMatchError::ResourceLimit(_))));
    }

    #[test]
    fn file_source_loads_png() {
        let sampler = ImageSampler::new(SamplerConfig::default());
        let config = sampler.config_snapshot().expect("config");

        let png = solid_png(4, 4, [9, 9, 9, 255]);
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(&png).expect("write png");

        let raw = sampler
            .load_source(ImageSource::FilePath(file.path().to_path_buf()), &config)
            .expect("load file");
        assert_eq!(raw.source_hint, "file");
        assert_eq!(raw.bytes.as_ref(), png.as_slice());
    }

    /// 3x2 的二进制 PPM（P6），`infer` 不识别但 `image` 可解码。
    fn ppm_payload() -> Vec<u8> {
        let mut ppm = b"P6\n3 2\n255\n".to_vec();
        for _ in 0..6 {
            ppm.extend_from_slice(&[0, 128, 255]);
        }
        ppm
    }

    #[test]
    fn load_accepts_formats_only_image_recognizes() {
        let sampler = ImageSampler::new(SamplerConfig::default());
        let config = sampler.config_snapshot().expect("config");

        let raw = sampler
            .load_source(ImageSource::Bytes(Bytes::from(ppm_payload())), &config)
            .expect("ppm should pass the signature check");
        assert_eq!(raw.source_hint, "bytes");
    }

    #[test]
    fn ppm_upload_samples_to_grid() {
        let mut config = SamplerConfig::default();
        config.apply_sampling_profile(crate::pixel_match::SamplingProfile::Sharp);
        let sampler = ImageSampler::new(config);

        let pixels = sampler
            .sample_blocking(ImageSource::Bytes(Bytes::from(ppm_payload())), 21)
            .expect("sample ppm");

        assert_eq!((pixels.width(), pixels.height()), (21, 21));
        assert!(pixels.colors().iter().flatten().all(|c| c == "#0080ff"));
    }
}
