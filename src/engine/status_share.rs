use lazy_static::lazy_static;
use parking_lot::Mutex;

use crate::models::result::StatsSnapshot;

// 全局只保留最新一次的快照
lazy_static! {
    static ref LATEST_SNAPSHOT: Mutex<Option<StatsSnapshot>> = Mutex::new(None);
}

/// 由聚合器调用，覆盖旧的快照
pub fn publish(snapshot: StatsSnapshot) {
    *LATEST_SNAPSHOT.lock() = Some(snapshot);
}

/// 嵌入方轮询运行中的统计数据
pub fn latest_snapshot() -> Option<StatsSnapshot> {
    LATEST_SNAPSHOT.lock().clone()
}
