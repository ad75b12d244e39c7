//! Cooperative task scheduler.
//!
//! Single-threaded, two lanes: *timed* tasks fire once their virtual due
//! time is reached, *idle* tasks fire whenever nothing timed is ready.
//! Nothing here touches wall clocks; the embedding drives virtual time
//! with [`Scheduler::advance`] and executes whatever [`Scheduler::pop_ready`]
//! hands back. Tasks are plain descriptors, so cancellation is a queue
//! sweep and execution stays with the store that owns the state.

use std::collections::VecDeque;

/// Task handle.
pub type TaskId = i32;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// What a scheduled task does when it fires.
pub enum TaskKind {
  /// One asynchronous line-metrics tick for a viewer.
  MetricTick { viewer: usize },
  /// Report fresh scroll fractions for a viewer.
  ScrollReport { viewer: usize },
}

impl TaskKind {
  fn viewer(&self) -> usize {
    match self {
      TaskKind::MetricTick { viewer } => *viewer,
      TaskKind::ScrollReport { viewer } => *viewer,
    }
  }

  fn with_viewer(self, viewer: usize) -> Self {
    match self {
      TaskKind::MetricTick { .. } => TaskKind::MetricTick { viewer },
      TaskKind::ScrollReport { .. } => TaskKind::ScrollReport { viewer },
    }
  }
}

#[derive(Debug)]
struct TimedTask {
  id: TaskId,
  due: u64,
  kind: TaskKind,
}

#[derive(Debug)]
struct IdleTask {
  id: TaskId,
  kind: TaskKind,
}

#[derive(Debug, Default)]
pub struct Scheduler {
  now: u64,
  next_id: TaskId,
  timed: Vec<TimedTask>,
  idle: VecDeque<IdleTask>,
}

impl Scheduler {
  pub fn new() -> Self {
    Self::default()
  }

  /// Current virtual time in milliseconds.
  pub fn now(&self) -> u64 {
    self.now
  }

  /// Move virtual time forward.
  pub fn advance(&mut self, ms: u64) {
    self.now += ms;
  }

  fn fresh_id(&mut self) -> TaskId {
    self.next_id += 1;
    self.next_id
  }

  /// Schedule `kind` to fire `delay_ms` from now.
  pub fn schedule_timed(&mut self, delay_ms: u64, kind: TaskKind) -> TaskId {
    let id = self.fresh_id();
    let due = self.now + delay_ms;
    // Keep due-time order, FIFO among equals.
    let at = self.timed.partition_point(|t| t.due <= due);
    self.timed.insert(at, TimedTask { id, due, kind });
    id
  }

  /// Schedule `kind` to fire when nothing timed is ready.
  pub fn schedule_idle(&mut self, kind: TaskKind) -> TaskId {
    let id = self.fresh_id();
    self.idle.push_back(IdleTask { id, kind });
    id
  }

  pub fn cancel(&mut self, id: TaskId) {
    self.timed.retain(|t| t.id != id);
    self.idle.retain(|t| t.id != id);
  }

  /// Drop every task belonging to `viewer`.
  pub fn cancel_viewer(&mut self, viewer: usize) {
    self.timed.retain(|t| t.kind.viewer() != viewer);
    self.idle.retain(|t| t.kind.viewer() != viewer);
  }

  /// Re-point tasks at a viewer whose slot index moved.
  pub fn retarget_viewer(&mut self, old: usize, new: usize) {
    for t in self.timed.iter_mut() {
      if t.kind.viewer() == old {
        t.kind = t.kind.with_viewer(new);
      }
    }
    for t in self.idle.iter_mut() {
      if t.kind.viewer() == old {
        t.kind = t.kind.with_viewer(new);
      }
    }
  }

  /// Due time of the earliest timed task.
  pub fn next_due(&self) -> Option<u64> {
    self.timed.first().map(|t| t.due)
  }

  /// Whether a task would fire right now.
  pub fn has_ready(&self) -> bool {
    !self.idle.is_empty()
      || self.timed.first().is_some_and(|t| t.due <= self.now)
  }

  pub fn is_empty(&self) -> bool {
    self.timed.is_empty() && self.idle.is_empty()
  }

  /// Take the next runnable task: the earliest due timed task, otherwise
  /// an idle task.
  pub fn pop_ready(&mut self) -> Option<TaskKind> {
    if self.timed.first().is_some_and(|t| t.due <= self.now) {
      return Some(self.timed.remove(0).kind);
    }
    self.idle.pop_front().map(|t| t.kind)
  }
}

#[cfg(test)]
mod sched_tests {
  use super::*;

  #[test]
  fn timed_order1() {
    let mut s = Scheduler::new();
    s.schedule_timed(5, TaskKind::MetricTick { viewer: 0 });
    s.schedule_timed(1, TaskKind::ScrollReport { viewer: 0 });
    assert!(!s.has_ready());
    s.advance(1);
    assert_eq!(s.pop_ready(), Some(TaskKind::ScrollReport { viewer: 0 }));
    assert!(s.pop_ready().is_none());
    s.advance(4);
    assert_eq!(s.pop_ready(), Some(TaskKind::MetricTick { viewer: 0 }));
  }

  #[test]
  fn idle_runs_when_no_timed_ready1() {
    let mut s = Scheduler::new();
    s.schedule_timed(10, TaskKind::MetricTick { viewer: 1 });
    s.schedule_idle(TaskKind::ScrollReport { viewer: 2 });
    assert_eq!(s.pop_ready(), Some(TaskKind::ScrollReport { viewer: 2 }));
    assert!(s.pop_ready().is_none());
  }

  #[test]
  fn cancel_viewer1() {
    let mut s = Scheduler::new();
    s.schedule_timed(1, TaskKind::MetricTick { viewer: 0 });
    s.schedule_timed(1, TaskKind::MetricTick { viewer: 1 });
    s.cancel_viewer(0);
    s.advance(1);
    assert_eq!(s.pop_ready(), Some(TaskKind::MetricTick { viewer: 1 }));
    assert!(s.is_empty());
  }
}
