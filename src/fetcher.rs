// fetcher.rs — 回溯下载策略
// 当天条目不可用（视频、未知格式）时按固定间隔往回找，直到成功或次数用尽

use crate::config::FetchSettings;
use crate::error::FetchError;
use crate::source::{ApodSource, ImageRecord};
use chrono::{Days, NaiveDate};
use log::{error, info, warn};
use std::path::{Path, PathBuf};

/// APOD 第一张图片的日期，早于它的请求一定失败
pub fn first_apod_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1995, 6, 16).unwrap_or(NaiveDate::MIN)
}

/// 一次成功的获取结果
#[derive(Debug, Clone)]
pub struct Fetched {
    pub record: ImageRecord,
    /// 图片保存路径
    pub path: PathBuf,
    /// 成功之前往回跳了几次
    pub steps: u32,
}

/// 获取一条可用记录并把图片下载到 `dest`
///
/// 传输层错误立即返回，不做回溯；只有"内容不可用"才会往回跳
/// `settings.step_days` 天，最多 `settings.max_steps` 次。
pub async fn fetch_record<S>(
    source: &S,
    settings: &FetchSettings,
    hd: bool,
    dest: &Path,
) -> Result<Fetched, FetchError>
where
    S: ApodSource + ?Sized,
{
    let step = Days::new(u64::from(settings.step_days.max(1)));
    let mut probe: Option<NaiveDate> = None;
    let mut steps = 0u32;

    loop {
        let probe_label = probe.map_or_else(|| "today".to_string(), |d| d.to_string());
        let entry = source.entry(probe).await.map_err(|e| {
            error!("Fetching APOD entry for {} failed: {}", probe_label, e);
            FetchError::Source(e)
        })?;
        let served = entry.date;

        match entry.clone().into_record(hd) {
            Some(record) => {
                info!(
                    "Using APOD {} \"{}\" ({:?}) from {}",
                    record.date, record.title, record.media_type, record.image_url
                );
                source.download(&record.image_url, dest).await.map_err(|e| {
                    error!("Downloading {} failed: {}", record.image_url, e);
                    FetchError::Source(e)
                })?;
                return Ok(Fetched {
                    record,
                    path: dest.to_path_buf(),
                    steps,
                });
            }
            None => {
                warn!(
                    "APOD {} (probe {}) is unusable: media type {:?}, url {:?}",
                    served,
                    probe_label,
                    entry.media_type,
                    entry.resolved_url(hd)
                );
            }
        }

        let next = served
            .checked_sub_days(step)
            .filter(|d| *d >= first_apod_date());
        match next {
            Some(d) if steps < settings.max_steps => {
                steps += 1;
                info!("Stepping back to {} (step {}/{})", d, steps, settings.max_steps);
                probe = Some(d);
            }
            _ => {
                error!("Giving up after {} backward steps, last probe {}", steps, served);
                return Err(FetchError::Exhausted {
                    steps,
                    last_probe: served,
                });
            }
        }
    }
}
