use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// 按服务名维护的轮询计数器
#[derive(Debug, Default)]
pub struct RoundRobinSelector {
    counters: RwLock<HashMap<String, Arc<AtomicU64>>>,
}

impl RoundRobinSelector {
    pub fn new() -> Self {
        Self::default()
    }

    // 读锁查找，不存在时才在写锁下创建；自增发生在锁外
    fn counter_for(&self, service_name: &str) -> Arc<AtomicU64> {
        {
            let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(counter) = counters.get(service_name) {
                return counter.clone();
            }
        }

        let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        counters
            .entry(service_name.to_string())
            .or_default()
            .clone()
    }

    /// 从调用方捕获的候选列表中选出一个，列表为空时返回 `None`
    pub fn select<'a, T>(&self, service_name: &str, candidates: &'a [T]) -> Option<&'a T> {
        if candidates.is_empty() {
            return None;
        }

        let counter = self.counter_for(service_name);
        let ticket = counter.fetch_add(1, Ordering::Relaxed);
        let index = (ticket % candidates.len() as u64) as usize;
        candidates.get(index)
    }

    pub fn tracked_services(&self) -> usize {
        self.counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
