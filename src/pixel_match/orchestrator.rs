//! # 像素匹配编排器
//!
//! ## 设计思路
//!
//! 每个渲染周期都要回答三个问题：需不需要重新采样、旧的采样结果还能不能用、
//! 这一帧该画加载态、标准二维码还是像素匹配二维码。编排器用一个显式状态机回答：
//!
//! ```text
//!            启用 + 有图片 / 数据变化 / 分辨率变化
//!   Idle ───────────────────────────────────────→ Sampling
//!    ↑                                               │ 最新请求采样成功
//!    │ 关闭功能 / 移除图片 / 采样失败                   ↓
//!    └──────────────────────────────────────────── Ready
//! ```
//!
//! ## 实现思路
//!
//! - 每次发起采样都会递增 `generation`，并把它写进 `SampleTicket`。
//!   采样完成时只有 ticket 与当前 generation 相同才会被接受，
//!   因此乱序完成的旧请求会被直接丢弃（按请求身份而非完成顺序）。
//! - 防抖：`request_debounced` 先登记请求，睡眠防抖间隔后再检查 generation，
//!   期间被新输入覆盖的请求不再采样，突发输入只执行最后一次。
//! - 锁只保护状态切换，不跨越 `await`；解码在阻塞线程池中进行。

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::recolor::{ModuleMaskClassifier, RecolorStats, RedThreshold, recolor_with};
use super::renderer::{QrRenderer, RenderedQr};
use super::{
    ImageSampler, ImageSource, PixelData, PixelMatchError, QrStyleConfig, estimate_module_count,
};

/// 前景判定策略。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ForegroundStrategy {
    /// 红色通道阈值判定前景。
    #[default]
    RedThreshold,
    /// 渲染器模块掩码判定前景，不依赖像素颜色。
    ModuleMask,
}

/// 驱动采样的输入快照。
#[derive(Debug, Clone, PartialEq)]
pub struct PixelMatchInput {
    pub enabled: bool,
    pub image: Option<ImageSource>,
    pub data: String,
    pub resolution: Option<u32>,
    pub advanced_styling: bool,
}

impl PixelMatchInput {
    pub fn from_style(style: &QrStyleConfig, image: Option<ImageSource>) -> Self {
        Self {
            enabled: style.pixel_match_enabled,
            image,
            data: style.data.clone(),
            resolution: style.pixel_match_resolution,
            advanced_styling: style.has_advanced_styling(),
        }
    }

    /// 生效的采样网格边长：显式分辨率优先，否则按数据长度估算。
    pub fn target_size(&self) -> u32 {
        self.resolution.unwrap_or_else(|| estimate_module_count(&self.data))
    }
}

/// 一次采样请求。
#[derive(Debug, Clone)]
pub struct SampleTicket {
    pub generation: u64,
    pub source: ImageSource,
    pub target_size: u32,
}

/// 对外可见的状态快照。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelMatchState {
    Idle,
    Sampling { generation: u64, target_size: u32 },
    Ready { generation: u64, target_size: u32 },
}

/// 单帧渲染结果。
#[derive(Debug, Clone)]
pub enum RenderOutcome {
    /// 采样进行中，界面应显示中性加载态。
    Loading,
    /// 未启用像素匹配或无可用采样数据。
    Standard(RenderedQr),
    PixelMatched { rendered: RenderedQr, stats: RecolorStats },
}

impl RenderOutcome {
    pub fn rendered(&self) -> Option<&RenderedQr> {
        match self {
            Self::Loading => None,
            Self::Standard(rendered) | Self::PixelMatched { rendered, .. } => Some(rendered),
        }
    }

    pub fn is_pixel_matched(&self) -> bool {
        matches!(self, Self::PixelMatched { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct RequestKey {
    source: ImageSource,
    target_size: u32,
    data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Sampling,
    Ready,
}

struct Inner {
    phase: Phase,
    generation: u64,
    target_size: u32,
    last_request: Option<RequestKey>,
    pixel_data: Option<Arc<PixelData>>,
    last_error: Option<String>,
    requested_at: Option<Instant>,
}

/// 像素匹配编排器。
pub struct PixelMatchOrchestrator {
    sampler: ImageSampler,
    strategy: ForegroundStrategy,
    inner: Mutex<Inner>,
}

impl PixelMatchOrchestrator {
    pub fn new(sampler: ImageSampler, strategy: ForegroundStrategy) -> Self {
        Self {
            sampler,
            strategy,
            inner: Mutex::new(Inner {
                phase: Phase::Idle,
                generation: 0,
                target_size: 0,
                last_request: None,
                pixel_data: None,
                last_error: None,
                requested_at: None,
            }),
        }
    }

    pub fn sampler(&self) -> &ImageSampler {
        &self.sampler
    }

    pub fn strategy(&self) -> ForegroundStrategy {
        self.strategy
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, PixelMatchError> {
        self.inner
            .lock()
            .map_err(|_| PixelMatchError::ResourceLimit("编排器状态锁已中毒".to_string()))
    }

    /// 登记最新输入，必要时发起新的采样请求。
    ///
    /// 返回 `Some(ticket)` 表示进入 `Sampling`，调用方需执行采样并回填结果。
    pub fn update(&self, input: &PixelMatchInput) -> Result<Option<SampleTicket>, PixelMatchError> {
        let mut inner = self.lock()?;

        let source = match (&input.image, input.enabled) {
            (Some(source), true) => source.clone(),
            _ => {
                Self::reset_to_idle(&mut inner);
                return Ok(None);
            }
        };

        let target_size = input.target_size();
        if target_size == 0 {
            return Err(PixelMatchError::InvalidConfig("采样网格边长必须大于 0".to_string()));
        }

        let key = RequestKey {
            source: source.clone(),
            target_size,
            data: input.data.clone(),
        };
        if inner.last_request.as_ref() == Some(&key) {
            return Ok(None);
        }

        if input.advanced_styling {
            log::info!("ℹ️ 像素匹配模式下高级样式将被忽略");
        }

        inner.generation += 1;
        inner.phase = Phase::Sampling;
        inner.target_size = target_size;
        inner.last_request = Some(key);
        inner.pixel_data = None;
        inner.last_error = None;
        inner.requested_at = Some(Instant::now());

        log::debug!(
            "🔄 发起采样请求 - generation={} 网格: {}x{} 来源: {}",
            inner.generation,
            target_size,
            target_size,
            source.kind()
        );

        Ok(Some(SampleTicket {
            generation: inner.generation,
            source,
            target_size,
        }))
    }

    /// 关闭像素匹配并丢弃所有在途结果。
    pub fn disable(&self) -> Result<(), PixelMatchError> {
        let mut inner = self.lock()?;
        Self::reset_to_idle(&mut inner);
        Ok(())
    }

    fn reset_to_idle(inner: &mut Inner) {
        if inner.phase != Phase::Idle || inner.last_request.is_some() {
            // 递增 generation，让仍在途的采样结果失效
            inner.generation += 1;
        }
        inner.phase = Phase::Idle;
        inner.last_request = None;
        inner.pixel_data = None;
        inner.requested_at = None;
    }

    /// 回填采样结果。
    ///
    /// 仅当 ticket 仍是最新请求时生效，返回是否被接受。
    pub fn complete(
        &self,
        ticket: &SampleTicket,
        result: Result<PixelData, PixelMatchError>,
    ) -> bool {
        let mut inner = match self.lock() {
            Ok(inner) => inner,
            Err(err) => {
                log::error!("回填采样结果失败：{}", err);
                return false;
            }
        };

        if ticket.generation != inner.generation || inner.phase != Phase::Sampling {
            log::warn!(
                "⏭️ 丢弃过期采样结果 - ticket={} current={}",
                ticket.generation,
                inner.generation
            );
            return false;
        }

        let elapsed_ms = inner
            .requested_at
            .take()
            .map(|start| start.elapsed().as_millis())
            .unwrap_or(0);

        match result {
            Ok(pixel_data) => {
                inner.phase = Phase::Ready;
                inner.pixel_data = Some(Arc::new(pixel_data));
                log::info!(
                    "✅ 像素匹配就绪 - generation={} 网格: {}x{} 耗时: {}ms",
                    ticket.generation,
                    ticket.target_size,
                    ticket.target_size,
                    elapsed_ms
                );
            }
            Err(err) => {
                // 保留 last_request：同一输入不会反复重试失败的图片
                if err.is_sampling_failure() {
                    log::warn!("⚠️ 图片无法用于像素匹配，回退标准渲染：{}（code={}）", err, err.code());
                } else {
                    log::error!("采样异常，回退标准渲染：{}（stage={}）", err, err.stage());
                }
                inner.phase = Phase::Idle;
                inner.pixel_data = None;
                inner.last_error = Some(err.to_string());
            }
        }

        true
    }

    /// 执行采样并回填结果。
    pub async fn run_sample(&self, ticket: SampleTicket) -> bool {
        let result = self
            .sampler
            .sample(ticket.source.clone(), ticket.target_size)
            .await;
        self.complete(&ticket, result)
    }

    /// 登记输入并立即采样（无防抖）。
    pub async fn refresh(&self, input: &PixelMatchInput) -> Result<bool, PixelMatchError> {
        match self.update(input)? {
            Some(ticket) => Ok(self.run_sample(ticket).await),
            None => Ok(false),
        }
    }

    /// 登记输入，防抖后采样。
    ///
    /// 防抖期间若有更新的输入，本次请求不再执行，返回 `Ok(false)`。
    pub async fn request_debounced(
        &self,
        input: &PixelMatchInput,
    ) -> Result<bool, PixelMatchError> {
        let Some(ticket) = self.update(input)? else {
            return Ok(false);
        };

        let debounce_ms = self.sampler.config_snapshot()?.debounce_ms;
        if debounce_ms > 0 {
            tokio::time::sleep(Duration::from_millis(debounce_ms)).await;
        }

        if self.current_generation()? != ticket.generation {
            log::debug!("⏭️ 防抖期间输入已更新，跳过 generation={}", ticket.generation);
            return Ok(false);
        }

        Ok(self.run_sample(ticket).await)
    }

    pub fn current_generation(&self) -> Result<u64, PixelMatchError> {
        Ok(self.lock()?.generation)
    }

    pub fn state(&self) -> Result<PixelMatchState, PixelMatchError> {
        let inner = self.lock()?;
        Ok(match inner.phase {
            Phase::Idle => PixelMatchState::Idle,
            Phase::Sampling => PixelMatchState::Sampling {
                generation: inner.generation,
                target_size: inner.target_size,
            },
            Phase::Ready => PixelMatchState::Ready {
                generation: inner.generation,
                target_size: inner.target_size,
            },
        })
    }

    pub fn pixel_data(&self) -> Result<Option<Arc<PixelData>>, PixelMatchError> {
        Ok(self.lock()?.pixel_data.clone())
    }

    /// 最近一次采样失败的原因（用于提示“该图片无法用于像素匹配”）。
    pub fn last_error(&self) -> Result<Option<String>, PixelMatchError> {
        Ok(self.lock()?.last_error.clone())
    }

    /// 渲染一帧。
    ///
    /// `Sampling` 时返回 `Loading`；`Ready` 时在基础位图上重着色；其余情况为标准渲染。
    pub fn render(
        &self,
        renderer: &dyn QrRenderer,
        style: &QrStyleConfig,
    ) -> Result<RenderOutcome, PixelMatchError> {
        style.validate()?;

        let (phase, pixel_data) = {
            let inner = self.lock()?;
            (inner.phase, inner.pixel_data.clone())
        };

        if phase == Phase::Sampling {
            return Ok(RenderOutcome::Loading);
        }

        let mut rendered = renderer.render(style)?;

        let pixel_data = match (phase, pixel_data) {
            (Phase::Ready, Some(pixel_data)) if style.pixel_match_enabled => pixel_data,
            _ => return Ok(RenderOutcome::Standard(rendered)),
        };

        // 几何始终按渲染器真实模块数计算，估算网格只决定取色分辨率
        let stats = match self.strategy {
            ForegroundStrategy::RedThreshold => recolor_with(
                &mut rendered.bitmap,
                &pixel_data,
                style,
                rendered.module_count,
                &RedThreshold::default(),
            ),
            ForegroundStrategy::ModuleMask => recolor_with(
                &mut rendered.bitmap,
                &pixel_data,
                style,
                rendered.module_count,
                &ModuleMaskClassifier::new(&rendered.mask),
            ),
        };

        if pixel_data.width() != rendered.module_count {
            log::debug!(
                "采样网格 {}x{} 与渲染模块数 {} 不一致，已按比例取色",
                pixel_data.width(),
                pixel_data.height(),
                rendered.module_count
            );
        }

        Ok(RenderOutcome::PixelMatched { rendered, stats })
    }
}
