use std::collections::BTreeMap;

use serde::Serialize;

/// 状态码直方图 {状态码: 次数}，按状态码排序输出
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCodeStats {
    pub(crate) codes: BTreeMap<u16, u64>,
}

impl StatusCodeStats {
    pub fn new() -> Self {
        StatusCodeStats::default()
    }

    // 增加一个状态码的出现次数
    pub fn increment(&mut self, status_code: u16) {
        *self.codes.entry(status_code).or_insert(0) += 1;
    }

    pub fn get(&self, status_code: u16) -> u64 {
        self.codes.get(&status_code).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, u64)> + '_ {
        self.codes.iter().map(|(code, count)| (*code, *count))
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}
