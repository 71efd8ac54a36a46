//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 像素匹配链路中的所有失败都收敛到 `PixelMatchError`，避免字符串拼接式错误处理。
//! 这些错误对整个渲染循环都不是致命的：编排器捕获后回退到标准渲染。
//!
//! `code()` / `stage()` 给宿主 UI 提供稳定的分支依据，不依赖错误文案。

/// 像素匹配统一错误类型。
#[derive(Debug, thiserror::Error)]
pub enum PixelMatchError {
    /// 底层文件无法读取（不存在、权限不足等）。
    #[error("读取错误：{0}")]
    Read(String),

    /// 字节已读取，但无法解码为图像。
    #[error("解码错误：{0}")]
    Decode(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("配置错误：{0}")]
    InvalidConfig(String),

    #[error("渲染错误：{0}")]
    Render(String),

    #[error("导出错误：{0}")]
    Export(String),
}

impl PixelMatchError {
    /// 稳定错误码，供前端做分支判断。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Read(_) => "read_error",
            Self::Decode(_) => "decode_error",
            Self::InvalidFormat(_) => "invalid_format",
            Self::ResourceLimit(_) => "resource_limit",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Render(_) => "render_error",
            Self::Export(_) => "export_error",
        }
    }

    /// 错误发生的阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Read(_) => "load",
            Self::Decode(_) | Self::InvalidFormat(_) | Self::ResourceLimit(_) => "decode",
            Self::InvalidConfig(_) => "config",
            Self::Render(_) => "render",
            Self::Export(_) => "export",
        }
    }

    /// 是否属于“图片无法转成像素数据”一类。
    ///
    /// 编排器据此把功能回退为标准渲染，而不是向上抛出。
    pub fn is_sampling_failure(&self) -> bool {
        matches!(
            self,
            Self::Read(_) | Self::Decode(_) | Self::InvalidFormat(_) | Self::ResourceLimit(_)
        )
    }
}

impl From<PixelMatchError> for String {
    fn from(error: PixelMatchError) -> Self {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_stages_are_stable() {
        let read = PixelMatchError::Read("missing".into());
        assert_eq!(read.code(), "read_error");
        assert_eq!(read.stage(), "load");

        let decode = PixelMatchError::Decode("bad png".into());
        assert_eq!(decode.code(), "decode_error");
        assert_eq!(decode.stage(), "decode");

        let export = PixelMatchError::Export("svg".into());
        assert_eq!(export.stage(), "export");
    }

    #[test]
    fn only_input_failures_count_as_sampling_failures() {
        assert!(PixelMatchError::Read("x".into()).is_sampling_failure());
        assert!(PixelMatchError::Decode("x".into()).is_sampling_failure());
        assert!(!PixelMatchError::InvalidConfig("x".into()).is_sampling_failure());
        assert!(!PixelMatchError::Render("x".into()).is_sampling_failure());
    }

    #[test]
    fn converts_into_display_string() {
        let message: String = PixelMatchError::Decode("坏数据".into()).into();
        assert_eq!(message, "解码错误：坏数据");
    }
}
