// setter.rs — 系统壁纸设置模块

use crate::error::ApplyError;
use log::{info, warn};
use rust_i18n::t;
use std::path::Path;

/// 把合成好的图片设为桌面背景
///
/// 每次运行只调用一次；失败必须可见，这样更新标记才不会前进
pub trait WallpaperApplier {
    fn apply(&self, path: &Path) -> Result<(), ApplyError>;
}

/// 调用 `wallpaper` 库的真实实现，库会自动识别操作系统并调用相应的 API
pub struct DesktopApplier;

impl WallpaperApplier for DesktopApplier {
    fn apply(&self, path: &Path) -> Result<(), ApplyError> {
        let fail = |reason: String| ApplyError {
            path: path.to_path_buf(),
            reason,
        };

        // 系统 API 需要绝对路径
        let absolute = path
            .canonicalize()
            .map_err(|e| fail(e.to_string()))?;
        let path_str = absolute
            .to_str()
            .ok_or_else(|| fail(t!("error_utf8").to_string()))?;

        // 居中、不平铺；部分桌面环境不支持，失败只记录警告
        if let Err(e) = wallpaper::set_mode(wallpaper::Mode::Center) {
            warn!("Setting wallpaper mode failed: {}", e);
        }

        wallpaper::set_from_path(path_str).map_err(|e| fail(e.to_string()))?;
        info!("Wallpaper set to {}", path_str);
        Ok(())
    }
}
