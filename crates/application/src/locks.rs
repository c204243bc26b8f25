use std::collections::HashMap;
use std::sync::Arc;

use domain::RoomId;
use tokio::sync::Mutex;

/// 按房间粒度的互斥锁注册表。
///
/// 同一房间内的成员变更与轨迹写入串行执行，不同房间互不阻塞。
#[derive(Default)]
pub struct RoomLockRegistry {
    locks: Mutex<HashMap<RoomId, Arc<Mutex<()>>>>,
}

impl RoomLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取房间锁，首次访问时创建
    pub async fn for_room(&self, room_id: RoomId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(room_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 房间删除后移除对应条目
    pub async fn discard(&self, room_id: RoomId) {
        let mut locks = self.locks.lock().await;
        locks.remove(&room_id);
    }

    /// 当前登记的房间数
    pub async fn tracked_rooms(&self) -> usize {
        let locks = self.locks.lock().await;
        locks.len()
    }
}
