//! # 像素匹配二维码：命令行入口
//!
//! 本文件仅负责日志初始化、参数解析与结果落盘。
//! 业务逻辑分布在 `pixel_match` 子模块中，详见 `lib.rs` 架构文档。
//!
//! ```text
//! qr-pixel-match <data> <image> <out> [opacity] [resolution]
//! ```
//!
//! `out` 以 `.png` / `.svg` 结尾时写入该文件，否则视为目录并生成带时间戳的 PNG。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use qr_pixel_match::error::AppError;
use qr_pixel_match::pixel_match::{
    ExportArtifact, ExportFormat, ForegroundStrategy, ImageSource, ModuleQrRenderer,
    PixelMatchService, QrStyleConfig, RenderOutcome, SamplerConfig, save_png,
};

struct CliArgs {
    data: String,
    image: PathBuf,
    out: PathBuf,
    opacity: Option<f64>,
    resolution: Option<u32>,
}

fn parse_args<I>(args: I) -> Result<CliArgs, AppError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let usage = || {
        AppError::InvalidArgument(
            "用法：qr-pixel-match <data> <image> <out> [opacity] [resolution]".to_string(),
        )
    };

    let data = args.next().ok_or_else(usage)?;
    let image = args.next().map(PathBuf::from).ok_or_else(usage)?;
    let out = args.next().map(PathBuf::from).ok_or_else(usage)?;

    let opacity = args
        .next()
        .map(|raw| {
            raw.parse::<f64>()
                .map_err(|_| AppError::InvalidArgument(format!("opacity 不是合法数字：{}", raw)))
        })
        .transpose()?;
    let resolution = args
        .next()
        .map(|raw| {
            raw.parse::<u32>()
                .map_err(|_| AppError::InvalidArgument(format!("resolution 不是合法整数：{}", raw)))
        })
        .transpose()?;

    if args.next().is_some() {
        return Err(usage());
    }

    Ok(CliArgs {
        data,
        image,
        out,
        opacity,
        resolution,
    })
}

fn export_format_for(path: &Path) -> Option<ExportFormat> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("png") => Some(ExportFormat::Png),
        Some(ext) if ext.eq_ignore_ascii_case("svg") => Some(ExportFormat::Svg),
        _ => None,
    }
}

async fn run(args: CliArgs) -> Result<PathBuf, AppError> {
    let defaults = QrStyleConfig::default();
    let style = QrStyleConfig {
        data: args.data,
        pixel_match_enabled: true,
        pixel_match_opacity: args.opacity.unwrap_or(defaults.pixel_match_opacity),
        pixel_match_resolution: args.resolution,
        ..defaults
    };

    // 命令行一次性执行：无需防抖，前景按渲染器模块掩码判定
    let config = SamplerConfig {
        debounce_ms: 0,
        ..SamplerConfig::default()
    };
    let service = PixelMatchService::with_config(
        config,
        ForegroundStrategy::ModuleMask,
        Arc::new(ModuleQrRenderer),
    );
    service
        .apply_now(&style, Some(ImageSource::FilePath(args.image)))
        .await?;

    if let Some(reason) = service.orchestrator().last_error()? {
        log::warn!("像素匹配未生效，输出标准二维码：{}", reason);
    }

    let Some(format) = export_format_for(&args.out) else {
        let outcome = service.render(&style)?;
        return match outcome {
            RenderOutcome::Standard(rendered) | RenderOutcome::PixelMatched { rendered, .. } => {
                Ok(save_png(&rendered.bitmap, &args.out)?)
            }
            RenderOutcome::Loading => Err(AppError::InvalidArgument("采样尚未完成".to_string())),
        };
    };

    match service.export(&style, format)? {
        ExportArtifact::Png(bytes) => std::fs::write(&args.out, bytes)?,
        ExportArtifact::Svg(svg) => std::fs::write(&args.out, svg)?,
    }
    Ok(args.out)
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            log::error!("{err}");
            std::process::exit(2);
        }
    };

    match run(args).await {
        Ok(path) => log::info!("完成：{}", path.display()),
        Err(err) => {
            log::error!("生成失败: {err}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_required_and_optional_arguments() {
        let parsed = parse_args(args(&["hello", "in.png", "out.png", "0.5", "33"])).expect("parse");
        assert_eq!(parsed.data, "hello");
        assert_eq!(parsed.image, PathBuf::from("in.png"));
        assert_eq!(parsed.out, PathBuf::from("out.png"));
        assert_eq!(parsed.opacity, Some(0.5));
        assert_eq!(parsed.resolution, Some(33));
    }

    #[test]
    fn missing_required_argument_is_usage_error() {
        let result = parse_args(args(&["hello", "in.png"]));
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[test]
    fn trailing_extra_argument_is_rejected() {
        let result = parse_args(args(&["hello", "in.png", "out.png", "0.5", "33", "extra"]));
        assert!(matches!(result, Err(AppError::InvalidArgument(msg)) if msg.starts_with("用法")));
    }

    #[test]
    fn invalid_opacity_is_rejected() {
        let result = parse_args(args(&["hello", "in.png", "out.png", "half"]));
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[test]
    fn export_format_follows_extension() {
        assert_eq!(export_format_for(Path::new("a.PNG")), Some(ExportFormat::Png));
        assert_eq!(export_format_for(Path::new("a.svg")), Some(ExportFormat::Svg));
        assert_eq!(export_format_for(Path::new("out_dir")), None);
    }
}
