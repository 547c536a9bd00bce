use super::LoggingConfig;
use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Local, NaiveDate};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error};

/// 在当前 tokio 运行时上启动日志维护任务; 没有运行时则跳过
pub(super) fn spawn_log_maintenance_task(config: LoggingConfig) {
    let handle = match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle,
        Err(_) => {
            debug!("没有 tokio 运行时, 跳过日志维护任务");
            return;
        }
    };
    handle.spawn(async move {
        let period = Duration::from_secs(config.cleanup_interval_seconds.max(1));
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if let Err(err) = cleanup_logs(&config) {
                error!("清理日志失败: {}", err);
            }
        }
    });
}

/// 压缩历史日志并删除超过保留天数的文件
fn cleanup_logs(config: &LoggingConfig) -> Result<()> {
    let Some(directory) = config.directory.as_deref().map(Path::new) else {
        return Ok(());
    };
    if !directory.exists() {
        return Ok(());
    }
    let today = Local::now().date_naive();
    let cutoff = today - ChronoDuration::days(config.retention_days);

    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        let Some((date, compressed)) = parse_rotated_log_name(&file_name, &config.file_prefix)
        else {
            continue;
        };
        let file_path = entry.path();
        if date < cutoff {
            if let Err(err) = fs::remove_file(&file_path) {
                error!("删除过期日志失败, path={}, err={}", file_path.display(), err);
            }
            continue;
        }
        if config.compress_history && !compressed && date < today {
            if let Err(err) = compress_to_gz(&file_path) {
                error!("压缩日志失败, path={}, err={}", file_path.display(), err);
            }
        }
    }
    Ok(())
}

fn compress_to_gz(path: &Path) -> Result<()> {
    let gz_path = PathBuf::from(format!("{}.gz", path.display()));
    if gz_path.exists() {
        return Ok(());
    }
    let mut input =
        File::open(path).with_context(|| format!("打开待压缩日志失败, path={}", path.display()))?;
    let output = File::create(&gz_path)
        .with_context(|| format!("创建压缩日志失败, path={}", gz_path.display()))?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?.flush()?;
    fs::remove_file(path)
        .with_context(|| format!("删除已压缩日志失败, path={}", path.display()))?;
    Ok(())
}

fn parse_rotated_log_name(file_name: &str, prefix: &str) -> Option<(NaiveDate, bool)> {
    let rest = file_name.strip_prefix(prefix)?.strip_prefix('.')?;
    if let Some(date_part) = rest.strip_suffix(".log.gz") {
        return parse_date(date_part).map(|date| (date, true));
    }
    rest.strip_suffix(".log")
        .and_then(parse_date)
        .map(|date| (date, false))
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}
