//! # 服务层（可注入状态）
//!
//! ## 设计思路
//!
//! `PixelMatchService` 是宿主持有的唯一入口：内部组合编排器与渲染器，
//! 宿主只需要在样式或图片变化时调用 `apply`，每帧调用 `render`，导出时调用 `export`。
//! 渲染器以 trait 对象注入，测试可替换为任意实现。
//!
//! ## 实现思路
//!
//! - `apply` 走防抖路径，`apply_now` 立即采样（一次性任务使用）。
//! - 导出前根据当前帧是否为像素匹配结果校验格式。

use std::sync::Arc;

use super::export::{ExportFormat, ensure_export_supported, export_png, export_svg};
use super::orchestrator::{
    ForegroundStrategy, PixelMatchInput, PixelMatchOrchestrator, PixelMatchState, RenderOutcome,
};
use super::renderer::{ModuleQrRenderer, QrRenderer};
use super::{
    ImageSampler, ImageSource, PixelMatchError, QrStyleConfig, SamplerConfig, SamplingProfile,
};

/// 导出产物。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportArtifact {
    Png(Vec<u8>),
    Svg(String),
}

/// 像素匹配服务状态。
pub struct PixelMatchService {
    orchestrator: Arc<PixelMatchOrchestrator>,
    renderer: Arc<dyn QrRenderer>,
}

impl PixelMatchService {
    /// 使用默认配置与方形模块渲染器创建服务。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use qr_pixel_match::pixel_match::PixelMatchService;
    ///
    /// let service = PixelMatchService::new();
    /// assert_eq!(service.get_sampling_profile()?, "balanced");
    /// # Ok::<(), qr_pixel_match::pixel_match::PixelMatchError>(())
    /// ```
    pub fn new() -> Self {
        Self::with_config(
            SamplerConfig::default(),
            ForegroundStrategy::default(),
            Arc::new(ModuleQrRenderer),
        )
    }

    pub fn with_config(
        config: SamplerConfig,
        strategy: ForegroundStrategy,
        renderer: Arc<dyn QrRenderer>,
    ) -> Self {
        let orchestrator = PixelMatchOrchestrator::new(ImageSampler::new(config), strategy);
        Self {
            orchestrator: Arc::new(orchestrator),
            renderer,
        }
    }

    pub fn orchestrator(&self) -> &Arc<PixelMatchOrchestrator> {
        &self.orchestrator
    }

    /// 登记样式与图片变化，防抖后采样。返回本次请求是否最终生效。
    pub async fn apply(
        &self,
        style: &QrStyleConfig,
        image: Option<ImageSource>,
    ) -> Result<bool, PixelMatchError> {
        style.validate()?;
        let input = PixelMatchInput::from_style(style, image);
        self.orchestrator.request_debounced(&input).await
    }

    /// 登记变化并立即采样。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use qr_pixel_match::pixel_match::{ImageSource, PixelMatchService, QrStyleConfig};
    ///
    /// # async fn demo() -> Result<(), qr_pixel_match::pixel_match::PixelMatchError> {
    /// let service = PixelMatchService::new();
    /// let style = QrStyleConfig { pixel_match_enabled: true, ..QrStyleConfig::default() };
    /// service
    ///     .apply_now(&style, Some(ImageSource::FilePath("photo.jpg".into())))
    ///     .await?;
    /// let outcome = service.render(&style)?;
    /// assert!(outcome.is_pixel_matched());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn apply_now(
        &self,
        style: &QrStyleConfig,
        image: Option<ImageSource>,
    ) -> Result<bool, PixelMatchError> {
        style.validate()?;
        let input = PixelMatchInput::from_style(style, image);
        self.orchestrator.refresh(&input).await
    }

    pub fn render(&self, style: &QrStyleConfig) -> Result<RenderOutcome, PixelMatchError> {
        self.orchestrator.render(self.renderer.as_ref(), style)
    }

    /// 渲染当前帧并导出为指定格式。
    pub fn export(
        &self,
        style: &QrStyleConfig,
        format: ExportFormat,
    ) -> Result<ExportArtifact, PixelMatchError> {
        let outcome = self.render(style)?;
        let Some(rendered) = outcome.rendered() else {
            return Err(PixelMatchError::Export("图片仍在采样中，请稍后再导出".to_string()));
        };

        ensure_export_supported(format, outcome.is_pixel_matched())?;
        match format {
            ExportFormat::Png => Ok(ExportArtifact::Png(export_png(&rendered.bitmap)?)),
            ExportFormat::Svg => Ok(ExportArtifact::Svg(export_svg(rendered, style)?)),
        }
    }

    pub fn disable(&self) -> Result<(), PixelMatchError> {
        self.orchestrator.disable()
    }

    pub fn state(&self) -> Result<PixelMatchState, PixelMatchError> {
        self.orchestrator.state()
    }

    /// 切换采样档位（`sharp` / `balanced` / `smooth`）。
    ///
    /// 已缓存的结果按滤镜区分，切换后下一次采样才会生效。
    pub fn set_sampling_profile(&self, profile: &str) -> Result<(), PixelMatchError> {
        let profile = SamplingProfile::from_str(profile)?;
        self.orchestrator.sampler().set_sampling_profile(profile)
    }

    pub fn get_sampling_profile(&self) -> Result<String, PixelMatchError> {
        let profile = self.orchestrator.sampler().get_sampling_profile()?;
        Ok(profile.as_str().to_string())
    }
}

impl Default for PixelMatchService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel_match::sampler::test_support::solid_png;
    use bytes::Bytes;
    use std::thread;

    fn immediate_service() -> PixelMatchService {
        let config = SamplerConfig {
            debounce_ms: 0,
            ..SamplerConfig::default()
        };
        PixelMatchService::with_config(
            config,
            ForegroundStrategy::ModuleMask,
            Arc::new(ModuleQrRenderer),
        )
    }

    fn pixel_style() -> QrStyleConfig {
        QrStyleConfig {
            pixel_match_enabled: true,
            ..QrStyleConfig::default()
        }
    }

    fn green_image() -> ImageSource {
        ImageSource::Bytes(Bytes::from(solid_png(8, 8, [0, 200, 0, 255])))
    }

    #[test]
    fn service_set_and_get_profile_roundtrip() {
        let service = PixelMatchService::new();

        for profile in ["sharp", "smooth", "balanced"] {
            service.set_sampling_profile(profile).expect("set profile should succeed");
            assert_eq!(service.get_sampling_profile().expect("get profile"), profile);
        }
    }

    #[test]
    fn service_rejects_invalid_profile() {
        let service = PixelMatchService::new();
        let result = service.set_sampling_profile("ultra");
        assert!(matches!(result, Err(PixelMatchError::InvalidConfig(_))));
    }

    #[test]
    fn service_profile_concurrent_access_stress() {
        let service = Arc::new(PixelMatchService::new());

        let mut handles = Vec::new();
        for worker_id in 0..8usize {
            let service = Arc::clone(&service);
            handles.push(thread::spawn(move || {
                let profiles = ["sharp", "balanced", "smooth"];
                for i in 0..200 {
                    let profile = profiles[(worker_id + i) % profiles.len()];
                    service.set_sampling_profile(profile).expect("set profile should succeed");
                    let current = service
                        .get_sampling_profile()
                        .expect("get profile should succeed");
                    assert!(matches!(current.as_str(), "sharp" | "balanced" | "smooth"));
                }
            }));
        }

        for handle in handles {
            handle.join().expect("worker thread should not panic");
        }
    }

    #[tokio::test]
    async fn svg_export_is_refused_after_pixel_match() {
        let service = immediate_service();
        let style = pixel_style();

        assert!(service.apply_now(&style, Some(green_image())).await.expect("apply"));

        let svg = service.export(&style, ExportFormat::Svg);
        assert!(matches!(svg, Err(PixelMatchError::Export(_))));

        let png = service.export(&style, ExportFormat::Png).expect("png export");
        assert!(matches!(png, ExportArtifact::Png(bytes) if !bytes.is_empty()));
    }

    #[tokio::test]
    async fn svg_export_is_allowed_in_standard_mode() {
        let service = immediate_service();
        let style = QrStyleConfig::default();

        assert!(!service.apply_now(&style, Some(green_image())).await.expect("apply"));

        match service.export(&style, ExportFormat::Svg).expect("svg export") {
            ExportArtifact::Svg(svg) => assert!(svg.starts_with("<svg")),
            other => panic!("unexpected artifact {other:?}"),
        }
    }

    #[test]
    fn export_while_sampling_is_an_error() {
        let service = immediate_service();
        let input = PixelMatchInput::from_style(&pixel_style(), Some(green_image()));
        service.orchestrator().update(&input).expect("update");

        let result = service.export(&pixel_style(), ExportFormat::Png);
        assert!(matches!(result, Err(PixelMatchError::Export(_))));
    }

    #[tokio::test]
    async fn invalid_style_is_rejected_on_apply() {
        let service = immediate_service();
        let style = QrStyleConfig {
            pixel_match_resolution: Some(0),
            ..pixel_style()
        };
        let result = service.apply_now(&style, Some(green_image())).await;
        assert!(matches!(result, Err(PixelMatchError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn disable_returns_to_standard_rendering() {
        let service = immediate_service();
        let style = pixel_style();
        service.apply_now(&style, Some(green_image())).await.expect("apply");
        assert!(matches!(service.state().expect("state"), PixelMatchState::Ready { .. }));

        service.disable().expect("disable");
        assert_eq!(service.state().expect("state"), PixelMatchState::Idle);
        assert!(matches!(service.render(&style).expect("render"), RenderOutcome::Standard(_)));
    }
}
