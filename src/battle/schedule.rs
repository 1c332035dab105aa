use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::tokens::TokenTarget;

/// 延后到战斗时钟某一时刻执行的任务。
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduledTask {
    DealOpeningHand,
    EnemyAct,
    EnemyReplan,
    Hit { damage: i32, remaining: u32, interval_ms: u64 },
    ApplyToken { value: i32, target: TokenTarget },
}

#[derive(Debug, Clone)]
struct QueueItem {
    due_ms: u64,
    order: u64,
    task: ScheduledTask,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.due_ms == other.due_ms && self.order == other.order
    }
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// BinaryHeap 是最大堆：到期最早者优先，其次是最先插入者。
impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due_ms
            .cmp(&self.due_ms)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// 战斗时间轴：由外部时钟推进的单线程事件队列。
#[derive(Debug, Default)]
pub struct Timeline {
    heap: BinaryHeap<QueueItem>,
    now_ms: u64,
    order: u64,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn schedule(&mut self, delay_ms: u64, task: ScheduledTask) {
        self.order += 1;
        self.heap.push(QueueItem {
            due_ms: self.now_ms.saturating_add(delay_ms),
            order: self.order,
            task,
        });
    }

    /// 弹出不晚于 `until_ms` 到期的下一个任务，并把时钟移到其到期时刻。
    pub fn pop_due(&mut self, until_ms: u64) -> Option<ScheduledTask> {
        if self.heap.peek()?.due_ms > until_ms {
            return None;
        }
        let item = self.heap.pop()?;
        self.now_ms = self.now_ms.max(item.due_ms);
        Some(item.task)
    }

    pub fn set_now(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    pub fn next_due_ms(&self) -> Option<u64> {
        self.heap.peek().map(|item| item.due_ms)
    }

    pub fn contains(&self, predicate: impl Fn(&ScheduledTask) -> bool) -> bool {
        self.heap.iter().any(|item| predicate(&item.task))
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_pop_by_due_time_then_insertion_order() {
        let mut timeline = Timeline::new();
        timeline.schedule(500, ScheduledTask::EnemyReplan);
        timeline.schedule(100, ScheduledTask::EnemyAct);
        timeline.schedule(100, ScheduledTask::DealOpeningHand);

        assert_eq!(timeline.pop_due(1_000), Some(ScheduledTask::EnemyAct));
        assert_eq!(timeline.now_ms(), 100);
        assert_eq!(timeline.pop_due(1_000), Some(ScheduledTask::DealOpeningHand));
        assert_eq!(timeline.pop_due(1_000), Some(ScheduledTask::EnemyReplan));
        assert!(timeline.is_empty());
    }

    #[test]
    fn tasks_not_yet_due_stay_queued() {
        let mut timeline = Timeline::new();
        timeline.schedule(200, ScheduledTask::EnemyAct);

        assert_eq!(timeline.pop_due(199), None);
        assert_eq!(timeline.next_due_ms(), Some(200));
        assert_eq!(timeline.pop_due(200), Some(ScheduledTask::EnemyAct));
    }

    #[test]
    fn delays_are_relative_to_the_current_clock() {
        let mut timeline = Timeline::new();
        timeline.set_now(1_000);
        timeline.schedule(50, ScheduledTask::EnemyAct);
        assert_eq!(timeline.next_due_ms(), Some(1_050));
        timeline.set_now(10);
        assert_eq!(timeline.now_ms(), 1_000, "clock never runs backwards");
    }
}
