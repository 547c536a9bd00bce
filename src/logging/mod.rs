//! 日志初始化.
//!
//! 库 crate 通过 `log` 门面输出, 这里安装 `tracing-subscriber`
//! 同时接收 `log` 记录: 控制台一路, 配置了目录时再加按日期分文件的一路.

use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

mod task;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// 日志文件目录, 为空时只输出到控制台
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_true")]
    pub compress_history: bool,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            directory: None,
            file_prefix: default_file_prefix(),
            retention_days: default_retention_days(),
            compress_history: true,
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_file_prefix() -> String {
    "tao-hwaccel".to_string()
}

fn default_true() -> bool {
    true
}

fn default_retention_days() -> i64 {
    30
}

fn default_cleanup_interval() -> u64 {
    3600
}

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// 安装全局日志订阅器, 只能成功一次
pub fn init(config: LoggingConfig) -> Result<()> {
    let console_layer = fmt::Layer::default()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(ConsoleFormatter)
        .with_filter(EnvFilter::new(&config.level));

    let file_layer = match config.directory.as_deref() {
        Some(directory) => {
            let directory = Path::new(directory);
            std::fs::create_dir_all(directory)
                .with_context(|| format!("创建日志目录失败, path={}", directory.display()))?;
            let writer = CurrentFileWriter::new(directory, &config.file_prefix)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(writer);
            LOG_GUARD.set(guard).ok();
            Some(
                fmt::Layer::default()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .event_format(FileFormatter)
                    .with_filter(EnvFilter::new(&config.level)),
            )
        }
        None => None,
    };

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("安装日志订阅器失败")?;

    if config.directory.is_some() {
        task::spawn_log_maintenance_task(config);
    }
    Ok(())
}

/// 写入当天日志文件, 日期变化时切换到新文件
struct CurrentFileWriter {
    directory: PathBuf,
    prefix: String,
    date: NaiveDate,
    file: File,
}

impl CurrentFileWriter {
    fn new(directory: &Path, prefix: &str) -> Result<Self> {
        let today = Local::now().date_naive();
        let file = open_append_file(&build_current_log_path(directory, prefix, today))?;
        Ok(Self {
            directory: directory.to_path_buf(),
            prefix: prefix.to_string(),
            date: today,
            file,
        })
    }

    fn switch_to(&mut self, date: NaiveDate) -> std::io::Result<()> {
        let path = build_current_log_path(&self.directory, &self.prefix, date);
        self.file = open_append_file(&path).map_err(std::io::Error::other)?;
        self.date = date;
        Ok(())
    }
}

impl Write for CurrentFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let today = Local::now().date_naive();
        if today != self.date {
            self.file.flush()?;
            self.switch_to(today)?;
        }
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

fn open_append_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("打开日志文件失败, path={}", path.display()))
}

pub(crate) fn build_current_log_path(directory: &Path, prefix: &str, date: NaiveDate) -> PathBuf {
    directory.join(format!("{}.{}.log", prefix, date.format("%Y-%m-%d")))
}

fn write_timestamp(writer: &mut Writer<'_>) -> std::fmt::Result {
    let now = Local::now();
    write!(
        writer,
        "[{:02}-{:02} {:02}:{:02}:{:02}.{:03}] ",
        now.month(),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        now.timestamp_subsec_millis()
    )
}

struct ConsoleFormatter;

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        write_timestamp(&mut writer)?;
        let color = match *meta.level() {
            tracing::Level::ERROR => "\x1b[31m",
            tracing::Level::WARN => "\x1b[33m",
            tracing::Level::INFO => "\x1b[32m",
            _ => "\x1b[34m",
        };
        write!(
            writer,
            "{}{:5}\x1b[0m {} > ",
            color,
            meta.level().to_string(),
            meta.target()
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        write_timestamp(&mut writer)?;
        write!(
            writer,
            "{:5} {} > ",
            event.metadata().level().to_string(),
            event.metadata().target()
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
