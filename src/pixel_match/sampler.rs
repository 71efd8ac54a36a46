//! # 图片采样器
//!
//! ## 设计思路
//!
//! `ImageSampler` 只负责“上传图片 → 模块颜色网格”这一段，不关心渲染与状态机。
//! 处理链路固定为：
//! 1. 读取配置快照
//! 2. 按来源加载原始字节（`loader`）
//! 3. 解码、缩放到 N×N、逐像素转十六进制（`pipeline`）
//!
//! ## 实现思路
//!
//! - 配置通过 `Arc<RwLock<SamplerConfig>>` 支持运行时切档；单次采样使用同一快照。
//! - 解码属于 CPU 密集型工作，异步入口放到 `spawn_blocking`，不阻塞事件循环。
//! - 以 “内容哈希 + 网格边长 + 滤镜” 为键做 LRU 缓存，分辨率来回切换时无需重复解码。

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use image::imageops::FilterType;
use lru::LruCache;

use super::{ImageSource, PixelData, PixelMatchError, SamplerConfig, SamplingProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) struct SampleCacheKey {
    content_hash: u64,
    target_size: u32,
    filter: u8,
}

impl SampleCacheKey {
    pub(super) fn new(bytes: &[u8], target_size: u32, filter: FilterType) -> Self {
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        Self {
            content_hash: hasher.finish(),
            target_size,
            filter: filter_code(filter),
        }
    }
}

fn filter_code(filter: FilterType) -> u8 {
    match filter {
        FilterType::Nearest => 0,
        FilterType::Triangle => 1,
        FilterType::CatmullRom => 2,
        FilterType::Gaussian => 3,
        FilterType::Lanczos3 => 4,
    }
}

/// 图片采样器。
///
/// 内部状态均为 `Arc`，克隆成本很低，可直接移入阻塞任务。
#[derive(Clone)]
pub struct ImageSampler {
    pub(super) config: Arc<RwLock<SamplerConfig>>,
    pub(super) cache: Option<Arc<Mutex<LruCache<SampleCacheKey, PixelData>>>>,
}

impl ImageSampler {
    /// 根据初始配置创建采样器。
    ///
    /// # 示例
    /// ```rust
    /// use qr_pixel_match::pixel_match::{ImageSampler, SamplerConfig};
    ///
    /// let sampler = ImageSampler::new(SamplerConfig::default());
    /// ```
    pub fn new(config: SamplerConfig) -> Self {
        let cache = NonZeroUsize::new(config.sample_cache_entries)
            .map(|capacity| Arc::new(Mutex::new(LruCache::new(capacity))));
        Self {
            config: Arc::new(RwLock::new(config)),
            cache,
        }
    }

    /// 获取配置快照。
    pub fn config_snapshot(&self) -> Result<SamplerConfig, PixelMatchError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| PixelMatchError::ResourceLimit("配置读取锁已中毒".to_string()))
    }

    /// 切换采样档位。
    pub fn set_sampling_profile(&self, profile: SamplingProfile) -> Result<(), PixelMatchError> {
        let mut config = self
            .config
            .write()
            .map_err(|_| PixelMatchError::ResourceLimit("配置写入锁已中毒".to_string()))?;
        config.apply_sampling_profile(profile);

        log::info!(
            "⚙️ 已切换采样档位：{:?}（filter={:?}）",
            profile,
            config.resize_filter
        );

        Ok(())
    }

    /// 获取当前生效档位。
    pub fn get_sampling_profile(&self) -> Result<SamplingProfile, PixelMatchError> {
        Ok(self.config_snapshot()?.infer_sampling_profile())
    }

    /// 异步采样：加载并把图片降采样为 `target_size × target_size` 的颜色网格。
    ///
    /// 同一图片、同一边长、同一滤镜多次采样结果完全一致。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use qr_pixel_match::pixel_match::{ImageSampler, ImageSource, SamplerConfig};
    ///
    /// # async fn demo() -> Result<(), qr_pixel_match::pixel_match::PixelMatchError> {
    /// let sampler = ImageSampler::new(SamplerConfig::default());
    /// let pixels = sampler
    ///     .sample(ImageSource::FilePath("logo.png".into()), 21)
    ///     .await?;
    /// assert_eq!(pixels.width(), 21);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn sample(
        &self,
        source: ImageSource,
        target_size: u32,
    ) -> Result<PixelData, PixelMatchError> {
        let sampler = self.clone();
        tokio::task::spawn_blocking(move || sampler.sample_blocking(source, target_size))
            .await
            .map_err(|e| PixelMatchError::Decode(format!("采样任务异常终止：{}", e)))?
    }

    /// 同步采样入口。
    pub fn sample_blocking(
        &self,
        source: ImageSource,
        target_size: u32,
    ) -> Result<PixelData, PixelMatchError> {
        if target_size == 0 {
            return Err(PixelMatchError::InvalidConfig("采样网格边长必须大于 0".to_string()));
        }

        let config = self.config_snapshot()?;
        let total_start = Instant::now();

        let load_start = Instant::now();
        let raw = self.load_source(source, &config)?;
        let load_elapsed = load_start.elapsed();

        let key = SampleCacheKey::new(&raw.bytes, target_size, config.resize_filter);
        if let Some(hit) = self.cached_sample(&key) {
            log::debug!(
                "♻️ 命中采样缓存 - 来源: {} 网格: {}x{}",
                raw.source_hint,
                target_size,
                target_size
            );
            return Ok(hit);
        }

        let decode_start = Instant::now();
        let pixels = self.decode_to_pixel_data(raw, target_size, &config)?;
        let decode_elapsed = decode_start.elapsed();

        self.store_sample(key, &pixels);

        log::info!(
            "✅ 图片采样完成 - 网格: {}x{} load={}ms decode={}ms total={}ms",
            target_size,
            target_size,
            load_elapsed.as_millis(),
            decode_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(pixels)
    }

    fn cached_sample(&self, key: &SampleCacheKey) -> Option<PixelData> {
        let cache = self.cache.as_ref()?;
        let mut guard = cache.lock().ok()?;
        guard.get(key).cloned()
    }

    fn store_sample(&self, key: SampleCacheKey, pixels: &PixelData) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        match cache.lock() {
            Ok(mut guard) => {
                guard.put(key, pixels.clone());
            }
            Err(_) => log::warn!("⚠️ 采样缓存锁已中毒，跳过写入"),
        }
    }

    #[cfg(test)]
    pub(super) fn cache_len(&self) -> usize {
        self.cache
            .as_ref()
            .and_then(|cache| cache.lock().ok().map(|guard| guard.len()))
            .unwrap_or(0)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
    use std::io::Cursor;

    /// 生成指定尺寸的 PNG 字节，像素颜色由闭包决定。
    pub(crate) fn png_from_fn<F>(width: u32, height: u32, f: F) -> Vec<u8>
    where
        F: Fn(u32, u32) -> Rgba<u8>,
    {
        let img = ImageBuffer::from_fn(width, height, f);
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    pub(crate) fn solid_png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        png_from_fn(width, height, |_, _| Rgba(color))
    }
}
