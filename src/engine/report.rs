use std::fmt::Write as _;
use std::time::Duration;

use serde::Serialize;

use crate::engine::aggregator::AggregateStats;

const MIB: f64 = 1024.0 * 1024.0;
// 文本格式标签宽度
const LABEL_WIDTH: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ReportFormat {
    #[default]
    Text,
    Xml,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResponseCodeCount {
    pub code: u16,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Percentile {
    pub percentile: u8,
    pub seconds: f64,
}

/// 最终报告，所有派生指标在构建时一次算好
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub transactions: u64,
    // 百分比
    pub availability: f64,
    pub elapsed_time: f64,
    // MiB
    pub data_transferred: f64,
    pub response_time: f64,
    pub transaction_rate: f64,
    // MiB/s
    pub throughput: f64,
    pub concurrency: f64,
    pub successful_transactions: u64,
    pub failed_transactions: u64,
    pub longest_transaction: f64,
    pub shortest_transaction: f64,
    pub response_codes: Vec<ResponseCodeCount>,
    pub percentiles: Vec<Percentile>,
}

impl Report {
    /// 以当前时刻计算耗时
    pub fn from_stats(stats: &AggregateStats) -> Self {
        Report::new(stats, stats.elapsed())
    }

    pub fn new(stats: &AggregateStats, elapsed: Duration) -> Self {
        let elapsed = elapsed.as_secs_f64();
        let total = stats.total as f64;
        Report {
            transactions: stats.total,
            availability: stats.availability() * 100.0,
            elapsed_time: elapsed,
            data_transferred: stats.bytes as f64 / MIB,
            response_time: ratio(elapsed, total),
            transaction_rate: ratio(total, elapsed),
            throughput: ratio(stats.bytes as f64, elapsed) / MIB,
            concurrency: ratio(stats.total_time.as_secs_f64(), elapsed),
            successful_transactions: stats.success,
            failed_transactions: stats.fail,
            longest_transaction: stats.longest.unwrap_or_default().as_secs_f64(),
            shortest_transaction: stats.shortest.unwrap_or_default().as_secs_f64(),
            response_codes: stats
                .codes
                .iter()
                .map(|(code, count)| ResponseCodeCount { code, count })
                .collect(),
            percentiles: percentiles(&stats.times),
        }
    }

    pub fn render(&self, format: ReportFormat) -> anyhow::Result<String> {
        match format {
            ReportFormat::Text => Ok(self.to_text()),
            ReportFormat::Xml => Ok(self.to_xml()),
            ReportFormat::Json => Ok(serde_json::to_string_pretty(self)?),
        }
    }

    fn main_rows(&self) -> [(&'static str, String); 12] {
        [
            ("Transactions", self.transactions.to_string()),
            ("Availability", format!("{:.2}%", self.availability)),
            ("Elapsed time", format!("{:.4}s", self.elapsed_time)),
            ("Data transferred", format!("{:.4} MB", self.data_transferred)),
            ("Response time", format!("{:.4}s", self.response_time)),
            ("Transaction rate", format!("{:.4}/s", self.transaction_rate)),
            ("Throughput", format!("{:.4} MB/s", self.throughput)),
            ("Concurrency", format!("{:.4}", self.concurrency)),
            ("Successful transactions", self.successful_transactions.to_string()),
            ("Failed transactions", self.failed_transactions.to_string()),
            ("Longest transaction", format!("{:.4}s", self.longest_transaction)),
            ("Shortest transaction", format!("{:.4}s", self.shortest_transaction)),
        ]
    }

    fn code_rows(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.response_codes
            .iter()
            .map(|c| (format!("HTTP_{}", c.code), c.count.to_string()))
    }

    fn percentile_rows(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.percentiles
            .iter()
            .map(|p| (format!("p{}", p.percentile), format!("{:.4}s", p.seconds)))
    }

    fn to_text(&self) -> String {
        let mut out = String::new();
        for (label, value) in self.main_rows() {
            text_row(&mut out, label, &value);
        }
        out.push('\n');
        text_header(&mut out, "Response codes");
        for (label, value) in self.code_rows() {
            text_row(&mut out, &label, &value);
        }
        out.push('\n');
        text_header(&mut out, "Response time percentiles");
        for (label, value) in self.percentile_rows() {
            text_row(&mut out, &label, &value);
        }
        out
    }

    fn to_xml(&self) -> String {
        let mut out = String::from("<result>");
        for (label, value) in self.main_rows() {
            xml_row(&mut out, label, &value);
        }
        out.push_str("<response_codes>");
        for (label, value) in self.code_rows() {
            xml_row(&mut out, &label, &value);
        }
        out.push_str("</response_codes><percentiles>");
        for (label, value) in self.percentile_rows() {
            xml_row(&mut out, &label, &value);
        }
        out.push_str("</percentiles></result>");
        out
    }
}

/// 排序后取 floor(n * d / 100) 位置的样本，越界的百分位不输出
pub fn percentiles(samples: &[f64]) -> Vec<Percentile> {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    (10..100u8)
        .step_by(10)
        .filter_map(|d| {
            let index = sorted.len() * d as usize / 100;
            sorted.get(index).map(|&seconds| Percentile {
                percentile: d,
                seconds,
            })
        })
        .collect()
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

fn text_row(out: &mut String, label: &str, value: &str) {
    let _ = writeln!(out, "{:>width$}: {}", label, value, width = LABEL_WIDTH);
}

fn text_header(out: &mut String, label: &str) {
    let _ = writeln!(out, "{:>width$}:", label, width = LABEL_WIDTH);
}

fn xml_row(out: &mut String, label: &str, value: &str) {
    let tag = label.to_lowercase().replace(' ', "_");
    let _ = write!(out, "<{tag}>{value}</{tag}>");
}
