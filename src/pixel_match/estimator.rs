//! # 模块数估算
//!
//! 按数据字节长度近似 QR 版本（1~6），只用于决定采样网格大小。
//! 真实的模块数由渲染器按纠错等级与编码模式决定，可能与这里不同，
//! 重着色阶段会按比例换算以容忍两者不一致。

/// 估算结果的全部取值，按版本递增。
pub const MODULE_COUNT_STEPS: [u32; 6] = [21, 25, 29, 33, 37, 41];

/// `(数据长度上限, 模块数)` 断点表。
const BREAKPOINTS: [(usize, u32); 5] = [(25, 21), (47, 25), (77, 29), (114, 33), (154, 37)];

/// 根据载荷长度估算 QR 模块网格边长。
///
/// 纯函数，永不失败；结果是长度的单调不减阶梯函数。
///
/// # 示例
/// ```rust
/// use qr_pixel_match::pixel_match::estimate_module_count;
///
/// assert_eq!(estimate_module_count("https://example.com"), 21);
/// ```
pub fn estimate_module_count(data: &str) -> u32 {
    let len = data.len();
    BREAKPOINTS
        .iter()
        .find(|(limit, _)| len <= *limit)
        .map(|(_, count)| *count)
        .unwrap_or(41)
}
