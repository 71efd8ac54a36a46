//! # 像素匹配模块（pixel_match）
//!
//! ## 设计思路
//!
//! 像素匹配把一张上传图片“铺”到二维码的深色模块上：每个模块取图片对应位置的颜色，
//! 按不透明度与默认点颜色混合后写回位图，浅色模块与边距保持不变，扫码对比度得以保留。
//!
//! 模块按职责拆分：
//!
//! - `estimator`：按数据长度估算模块网格边长
//! - `loader` / `pipeline`：来源加载与安全校验、解码与降采样
//! - `sampler`：对外的采样入口（配置快照、缓存、阻塞线程池）
//! - `color`：十六进制解析与线性混合
//! - `recolor`：对渲染好的位图逐模块改色
//! - `renderer`：渲染器边界与默认方形模块实现
//! - `orchestrator`：状态机、请求代次与防抖
//! - `service`：宿主持有的可注入状态
//! - `export`：PNG/SVG 导出
//! - `config/error/source`：配置、错误、中间数据模型
//!
//! ## 新同事快速上手
//!
//! ```text
//! 宿主（样式 / 图片变化）
//!    ↓
//! service.rs（apply / render / export）
//!    ↓
//! orchestrator.rs（Idle → Sampling → Ready，过期结果丢弃）
//!    ├─ estimator.rs（数据长度 → 网格边长）
//!    ├─ sampler.rs
//!    │    ├─ loader.rs（字节 / Base64 / 文件 + 体积与签名校验）
//!    │    └─ pipeline.rs（解码 + 像素限制 + N×N 采样）
//!    ├─ renderer.rs（基础位图 + 模块掩码）
//!    └─ recolor.rs（color.rs 混合后写回深色像素）
//!    ↓
//! export.rs（PNG / SVG）
//! ```
//!
//! ## 示例
//!
//! ```rust
//! use qr_pixel_match::pixel_match::{Rgb, estimate_module_count, hex_to_rgb};
//!
//! assert_eq!(estimate_module_count("https://example.com"), 21);
//! assert_eq!(hex_to_rgb("#ff8000"), Some(Rgb::new(255, 128, 0)));
//! ```

mod color;
mod config;
mod error;
mod estimator;
pub mod export;
mod loader;
pub mod orchestrator;
mod pipeline;
pub mod recolor;
pub mod renderer;
pub(crate) mod sampler;
mod service;
mod source;

pub use color::{BlendMode, Rgb, blend, blend_rgb, hex_to_rgb, rgba_to_hex};
pub use config::{
    CornerEyeStyle, DotShape, MAX_PIXEL_MATCH_RESOLUTION, QrStyleConfig, SamplerConfig,
    SamplingProfile,
};
pub use error::PixelMatchError;
pub use estimator::{MODULE_COUNT_STEPS, estimate_module_count};
pub use export::{ExportFormat, ensure_export_supported, export_png, export_svg, save_png};
pub use orchestrator::{
    ForegroundStrategy, PixelMatchInput, PixelMatchOrchestrator, PixelMatchState, RenderOutcome,
    SampleTicket,
};
pub use recolor::{
    ForegroundClassifier, ModuleMaskClassifier, RecolorStats, RedThreshold, recolor, recolor_with,
};
pub use renderer::{ModuleMask, ModuleQrRenderer, QrRenderer, RenderedQr};
pub use sampler::ImageSampler;
pub use service::{ExportArtifact, PixelMatchService};
pub use source::{ImageSource, PixelData};
