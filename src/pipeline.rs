// pipeline.rs — 一次完整的更新流程
// 闸门 -> 回溯下载 -> 合成 -> 设置壁纸 -> 写入更新标记

use crate::compositor::{self, font::Face, layout::LayoutState};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::fetcher;
use crate::gate::{self, RunLock, UpdateMarker};
use crate::setter::WallpaperApplier;
use crate::source::{ApodSource, ImageRecord};
use chrono::Utc;
use log::{error, info};

/// 一次运行的结果
#[derive(Debug)]
pub enum RunOutcome {
    /// 距上次成功更新还不够久
    Skipped { hours: f64 },
    Updated {
        record: ImageRecord,
        steps: u32,
        layout: Option<LayoutState>,
    },
}

/// 执行流水线；`force` 为真时跳过更新闸门
///
/// 只有全部步骤成功才会写入更新标记，任何致命错误都让标记保持原样，
/// 下次定时触发时会重新走完整流程。
pub async fn run<S, A>(
    config: &AppConfig,
    source: &S,
    applier: &A,
    face: &Face,
    force: bool,
) -> Result<RunOutcome, AppError>
where
    S: ApodSource + ?Sized,
    A: WallpaperApplier + ?Sized,
{
    config.ensure_dirs()?;
    let lock_path = config.lock_path();
    let _lock = RunLock::try_acquire(&lock_path)?.ok_or(AppError::Locked(lock_path))?;

    let marker_path = config.marker_path();
    if !force {
        let refresh = config.schedule.refresh_hours;
        let hours = gate::hours_since_last_update(&marker_path, refresh, Utc::now());
        if !gate::is_due(hours, refresh) {
            info!("No update needed, last success {:.2} hours ago", hours);
            return Ok(RunOutcome::Skipped { hours });
        }
        info!("Update due ({} hours since last success)", hours);
    } else {
        info!("Forced update requested");
    }

    let raw_path = config.raw_image_path();
    let fetched = fetcher::fetch_record(source, &config.fetch, config.hd, &raw_path).await?;

    let composed_path = config.composed_image_path();
    let layout = compositor::compose_file(
        &fetched.path,
        &composed_path,
        &fetched.record,
        config.display,
        &config.caption,
        face,
    )
    .inspect_err(|e| error!("Composition failed: {}", e))?;

    applier
        .apply(&composed_path)
        .inspect_err(|e| error!("{}", e))?;

    let marker = UpdateMarker {
        last_success: Utc::now(),
    };
    if let Err(e) = marker.store(&marker_path) {
        error!(
            "Failed to record last successful run to {}: {}",
            marker_path.display(),
            e
        );
    }

    info!("APOD wallpaper update complete");
    Ok(RunOutcome::Updated {
        record: fetched.record,
        steps: fetched.steps,
        layout,
    })
}
