// ==========================================
// 考试排期系统 - (考场, 日期, 时段) 互斥锁表
// ==========================================
// 职责: 同一 SlotKey 的 "校验 + 写入" 串行执行
// 说明: 数据库部分唯一索引 idx_exam_active_slot 仍为最终兜底
// ==========================================

use crate::domain::exam::SlotKey;
use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// 按 SlotKey 加锁的锁表
#[derive(Default)]
pub struct SlotLockMap {
    held: Mutex<HashSet<SlotKey>>,
    released: Condvar,
}

/// 持有期间占用一组 SlotKey，drop 时释放
pub struct SlotLockGuard<'a> {
    map: &'a SlotLockMap,
    keys: Vec<SlotKey>,
}

impl SlotLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn held(&self) -> MutexGuard<'_, HashSet<SlotKey>> {
        // 锁内只有集合增删，中毒后状态仍一致
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 阻塞直到获得全部 key
    ///
    /// 更新可能同时涉及旧位置与新位置，多个 key 一次性原子获取，避免交叉等待
    pub fn acquire(&self, keys: &[SlotKey]) -> SlotLockGuard<'_> {
        let mut wanted: Vec<SlotKey> = keys.to_vec();
        wanted.sort_by(|a, b| {
            (&a.room_id, a.exam_date, &a.slot_id).cmp(&(&b.room_id, b.exam_date, &b.slot_id))
        });
        wanted.dedup();

        let mut held = self.held();
        while wanted.iter().any(|k| held.contains(k)) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        for key in &wanted {
            held.insert(key.clone());
        }

        SlotLockGuard {
            map: self,
            keys: wanted,
        }
    }

    /// 当前被占用的 key 数
    pub fn held_count(&self) -> usize {
        self.held().len()
    }
}

impl Drop for SlotLockGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.map.held();
        for key in &self.keys {
            held.remove(key);
        }
        drop(held);
        self.map.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn key(room: &str) -> SlotKey {
        SlotKey::new(room, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(), "MORNING")
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let locks = SlotLockMap::new();
        {
            let _guard = locks.acquire(&[key("A102"), key("A102"), key("A103")]);
            assert_eq!(locks.held_count(), 2);
        }
        assert_eq!(locks.held_count(), 0);
    }

    #[test]
    fn test_same_key_is_serialized() {
        let locks = Arc::new(SlotLockMap::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    let _guard = locks.acquire(&[key("A102")]);
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(10));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}
