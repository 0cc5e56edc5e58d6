use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use crate::engine::aggregator::AggregateStats;
use crate::engine::report::{Report, ReportFormat};

/// 被中断的运行仍然输出已有统计，但以非0状态退出
pub fn exit_code(interrupted: bool) -> i32 {
    if interrupted {
        1
    } else {
        0
    }
}

/// 渲染并输出最终报告，返回进程退出码
pub fn finish(
    stats: &AggregateStats,
    format: ReportFormat,
    log_file: Option<&Path>,
    interrupted: bool,
) -> anyhow::Result<i32> {
    let report = Report::from_stats(stats).render(format)?;
    emit(&report, log_file);
    Ok(exit_code(interrupted))
}

/// 输出报告：配置了日志文件就追加写入，同时打印到终端
pub fn emit(report: &str, log_file: Option<&Path>) {
    if let Some(path) = log_file {
        if let Err(e) = append_to_log(path, report) {
            tracing::warn!(path = %path.display(), error = %e, "failed to write report to log file");
        }
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{}", report.trim_end());
    let _ = stdout.flush();
}

pub fn append_to_log(path: &Path, report: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(report.as_bytes())?;
    if !report.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    Ok(())
}
