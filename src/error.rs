//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 宿主侧入口（命令行、后续的 IPC 命令）统一返回 `Result<T, AppError>`，
//! 引擎内部错误与宿主自身的 I/O、参数错误在这里汇合。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `PixelMatchError` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串，便于直接回传前端。

use serde::Serialize;

use crate::pixel_match::PixelMatchError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 像素匹配链路错误（采样 / 渲染 / 导出）
    #[error("{0}")]
    PixelMatch(#[from] PixelMatchError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 宿主传入的参数无效
    #[error("参数错误: {0}")]
    InvalidArgument(String),
}

/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
