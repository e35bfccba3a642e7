// scheduler.rs — 系统定时任务集成模块
// Windows 上调用 schtasks，其他系统上维护当前用户的 crontab 条目

use crate::error::ScheduleError;
use log::info;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// 注册一个每 `interval_minutes` 分钟执行一次 `command` 的定时任务
pub fn install(task_name: &str, interval_minutes: u32, command: &Path) -> Result<(), ScheduleError> {
    let command = quote(&command.to_string_lossy());
    if cfg!(windows) {
        run(
            "schtasks",
            &[
                "/Create",
                "/SC",
                "MINUTE",
                "/MO",
                &interval_minutes.max(1).to_string(),
                "/TN",
                task_name,
                "/TR",
                &command,
                "/F",
            ],
        )?;
    } else {
        let existing = read_crontab()?;
        let entry = format!("{} {} {}", cron_expression(interval_minutes), command, tag(task_name));
        write_crontab(&with_entry(&existing, task_name, &entry))?;
    }
    info!("Registered scheduled task {:?} every {} min", task_name, interval_minutes);
    Ok(())
}

/// 删除定时任务；任务本来就不存在时视为成功
pub fn uninstall(task_name: &str) -> Result<(), ScheduleError> {
    if cfg!(windows) {
        run("schtasks", &["/Delete", "/TN", task_name, "/F"])?;
    } else {
        let existing = read_crontab()?;
        let remaining = without_entry(&existing, task_name);
        if remaining != existing {
            write_crontab(&remaining)?;
        }
    }
    info!("Removed scheduled task {:?}", task_name);
    Ok(())
}

/// 把当前可执行文件复制到固定位置
pub fn copy_executable(current: &Path, target: &Path) -> Result<(), ScheduleError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    // 从已安装的副本再次 install 时源和目标相同
    if current.canonicalize().ok() != target.canonicalize().ok() {
        fs::copy(current, target)?;
    }
    info!("Copied {} to {}", current.display(), target.display());
    Ok(())
}

pub fn remove_executable(target: &Path) -> Result<(), ScheduleError> {
    match fs::remove_file(target) {
        Ok(()) => {
            info!("Removed {}", target.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// 分钟间隔转换为 cron 表达式，超过一小时按整小时计
fn cron_expression(interval_minutes: u32) -> String {
    match interval_minutes {
        0 | 1 => "* * * * *".to_string(),
        m if m < 60 => format!("*/{} * * * *", m),
        m => format!("0 */{} * * *", (m / 60).min(23)),
    }
}

fn tag(task_name: &str) -> String {
    format!("# apodwall:{}", task_name)
}

fn quote(s: &str) -> String {
    if s.contains(' ') {
        format!("\"{}\"", s)
    } else {
        s.to_string()
    }
}

/// 去掉属于该任务的行
fn without_entry(crontab: &str, task_name: &str) -> String {
    let marker = tag(task_name);
    crontab
        .lines()
        .filter(|line| !line.trim_end().ends_with(&marker))
        .map(|line| format!("{}\n", line))
        .collect()
}

/// 替换（或追加）该任务的行
fn with_entry(crontab: &str, task_name: &str, entry: &str) -> String {
    let mut out = without_entry(crontab, task_name);
    out.push_str(entry);
    out.push('\n');
    out
}

fn read_crontab() -> Result<String, ScheduleError> {
    let output = Command::new("crontab")
        .arg("-l")
        .output()
        .map_err(|source| ScheduleError::Spawn {
            program: "crontab".to_string(),
            source,
        })?;
    // 用户还没有 crontab 时 `crontab -l` 返回非零，按空表处理
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        Ok(String::new())
    }
}

fn write_crontab(content: &str) -> Result<(), ScheduleError> {
    let spawn_err = |source: std::io::Error| ScheduleError::Spawn {
        program: "crontab".to_string(),
        source,
    };
    let mut child = Command::new("crontab")
        .arg("-")
        .stdin(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(spawn_err)?;
    if let Some(stdin) = child.stdin.as_mut() {
        stdin.write_all(content.as_bytes()).map_err(spawn_err)?;
    }
    let output = child.wait_with_output().map_err(spawn_err)?;
    check("crontab", output)
}

fn run(program: &str, args: &[&str]) -> Result<(), ScheduleError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ScheduleError::Spawn {
            program: program.to_string(),
            source,
        })?;
    check(program, output)
}

fn check(program: &str, output: std::process::Output) -> Result<(), ScheduleError> {
    if output.status.success() {
        Ok(())
    } else {
        Err(ScheduleError::Failed {
            program: program.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
