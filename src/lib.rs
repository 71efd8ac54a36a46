//! # 像素匹配二维码配色引擎：库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 宿主（编辑器 UI / 命令行）                 │
//! │                                                          │
//! │   样式配置 (QrStyleConfig) ── 上传图片 (ImageSource)       │
//! │              │                         │                 │
//! └──────────────┼─────────────────────────┼─────────────────┘
//!                ↓  Result<T, AppError>    ↓
//! ┌──────────────┼─────────────────────────┼─────────────────┐
//! │              ↓          引擎 (Rust)     ↓                 │
//! │                                                          │
//! │  ┌─ error ────── AppError (统一错误类型)                  │
//! │  │                                                       │
//! │  └─ pixel_match                                          │
//! │      ├─ service       可注入状态，宿主唯一入口             │
//! │      ├─ orchestrator  Idle/Sampling/Ready 状态机 + 防抖    │
//! │      ├─ sampler       加载·解码·N×N 采样·缓存              │
//! │      ├─ renderer      基础位图 + 模块掩码                  │
//! │      ├─ recolor       深色模块逐像素改色                   │
//! │      └─ export        PNG / SVG 导出                      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError`，宿主侧入口的返回类型 |
//! | [`pixel_match`] | 模块数估算、图片采样、颜色混合、位图重着色、状态编排与导出 |

pub mod error;
pub mod pixel_match;
