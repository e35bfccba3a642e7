// gate.rs — 更新闸门
// 根据上次成功更新的时间戳判断是否需要刷新壁纸，并提供跨进程的运行锁

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use log::{debug, warn};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// 旧版本写入的本地时间格式，读取时仍然兼容
const LEGACY_MARKER_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// 持久化的"上次成功更新"记录，以 UTC 的 RFC 3339 文本保存
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateMarker {
    pub last_success: DateTime<Utc>,
}

impl UpdateMarker {
    /// 读取标记文件；不存在或内容损坏都返回 None
    pub fn load(path: &Path) -> Option<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                debug!("No readable update marker at {}: {}", path.display(), e);
                return None;
            }
        };
        let trimmed = content.trim();
        match parse_marker(trimmed) {
            Some(last_success) => Some(Self { last_success }),
            None => {
                warn!("Ignoring corrupt update marker {:?}", trimmed);
                None
            }
        }
    }

    pub fn store(&self, path: &Path) -> std::io::Result<()> {
        fs::write(
            path,
            self.last_success.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
    }
}

/// 优先按 RFC 3339 解析；旧格式没有时区，按本地时间换算
fn parse_marker(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = LEGACY_MARKER_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())?;
    // 夏令时跳过的那一小时在本地不存在，直接当作 UTC
    Some(
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map_or_else(|| naive.and_utc(), |dt| dt.with_timezone(&Utc)),
    )
}

/// 距上次成功更新过去了多少小时
///
/// 标记缺失或损坏时返回无穷大；时间戳在未来（时钟回拨）时钳制为
/// `refresh_hours`，保证闸门打开而不是返回负数。
pub fn hours_since_last_update(marker: &Path, refresh_hours: f64, now: DateTime<Utc>) -> f64 {
    let Some(UpdateMarker { last_success }) = UpdateMarker::load(marker) else {
        return f64::INFINITY;
    };
    let hours = (now - last_success).num_milliseconds() as f64 / 3_600_000.0;
    if hours < 0.0 {
        warn!(
            "Update marker {} is in the future, treating update as due",
            last_success
        );
        return refresh_hours;
    }
    hours
}

pub fn is_due(hours: f64, refresh_hours: f64) -> bool {
    hours >= refresh_hours
}

/// 进程级互斥锁，持有期间其他实例无法运行流水线
///
/// Unix 上使用 `flock` 建议锁，进程退出时由内核自动释放。
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// 尝试获取锁；已被占用时返回 `Ok(None)`
    pub fn try_acquire(path: &Path) -> std::io::Result<Option<Self>> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // SAFETY: fd 来自上面打开的文件，在本函数内一直有效
            let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
            if rc != 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::WouldBlock {
                    return Ok(None);
                }
                return Err(err);
            }
        }

        debug!("Acquired run lock {}", path.display());
        Ok(Some(Self {
            file,
            path: path.to_path_buf(),
        }))
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // SAFETY: 文件句柄在 self 存活期间有效
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
        debug!("Released run lock {}", self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use tempfile::tempdir;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn test_missing_marker_is_always_due() {
        let dir = tempdir().unwrap();
        let hours = hours_since_last_update(&dir.path().join("last_success"), 24.0, at(12, 0, 0));
        assert!(hours.is_infinite());
        assert!(is_due(hours, 24.0));
    }

    #[test]
    fn test_corrupt_marker_is_always_due() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("last_success");
        fs::write(&marker, "not a timestamp").unwrap();
        assert!(is_due(hours_since_last_update(&marker, 24.0, at(12, 0, 0)), 24.0));
    }

    #[test]
    fn test_recent_marker_keeps_gate_closed() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("last_success");
        let now = at(12, 0, 0);
        for age_minutes in [0_i64, 1, 90, 60 * 23 + 59] {
            UpdateMarker { last_success: now - Duration::minutes(age_minutes) }
                .store(&marker)
                .unwrap();
            let hours = hours_since_last_update(&marker, 24.0, now);
            assert!(hours >= 0.0);
            assert!(!is_due(hours, 24.0), "age {} min should not be due", age_minutes);
        }
    }

    #[test]
    fn test_old_marker_opens_gate() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("last_success");
        let now = at(12, 0, 0);
        UpdateMarker { last_success: now - Duration::hours(25) }
            .store(&marker)
            .unwrap();
        let hours = hours_since_last_update(&marker, 24.0, now);
        assert!((hours - 25.0).abs() < 1e-9);
        assert!(is_due(hours, 24.0));
    }

    #[test]
    fn test_future_marker_is_clamped_to_due() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("last_success");
        let now = at(12, 0, 0);
        UpdateMarker { last_success: now + Duration::hours(5) }
            .store(&marker)
            .unwrap();
        let hours = hours_since_last_update(&marker, 24.0, now);
        assert_eq!(hours, 24.0);
        assert!(is_due(hours, 24.0));
    }

    #[test]
    fn test_marker_is_written_as_utc_rfc3339() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("last_success");
        UpdateMarker { last_success: at(8, 15, 42) }.store(&marker).unwrap();
        assert_eq!(fs::read_to_string(&marker).unwrap(), "2024-03-10T08:15:42Z");
    }

    #[test]
    fn test_offset_marker_compares_as_same_instant() {
        // 同一时刻写成不同偏移，比较时不受本地时区和夏令时影响
        let dir = tempdir().unwrap();
        let marker = dir.path().join("last_success");
        fs::write(&marker, "2024-11-03T01:30:00-04:00").unwrap();
        let now = "2024-11-03T06:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let hours = hours_since_last_update(&marker, 24.0, now);
        assert!((hours - 0.5).abs() < 1e-9);
        assert!(!is_due(hours, 24.0));
    }

    #[test]
    fn test_legacy_local_formats_are_accepted() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("last_success");
        let naive = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(11, 30, 0)
            .unwrap();
        let expected = Local
            .from_local_datetime(&naive)
            .earliest()
            .unwrap()
            .with_timezone(&Utc);

        for text in ["2024-03-10 11:30\n", "2024-03-10 11:30:00"] {
            fs::write(&marker, text).unwrap();
            let loaded = UpdateMarker::load(&marker).unwrap();
            assert_eq!(loaded.last_success, expected, "marker {:?}", text);
        }
    }

    #[test]
    fn test_store_then_load_keeps_seconds() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("last_success");
        let written = UpdateMarker { last_success: at(8, 15, 42) };
        written.store(&marker).unwrap();
        assert_eq!(UpdateMarker::load(&marker), Some(written));
    }

    #[cfg(unix)]
    #[test]
    fn test_second_lock_is_refused_until_release() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("apodwall.lock");
        let first = RunLock::try_acquire(&path).unwrap();
        assert!(first.is_some());
        assert!(RunLock::try_acquire(&path).unwrap().is_none());
        drop(first);
        assert!(RunLock::try_acquire(&path).unwrap().is_some());
    }
}
