//! Task Scheduler Implementation

use crate::error::SchedulerError;
use mcu_hal::{elapsed, Tick, TickCounter};
use tracing::{debug, info, warn};

/// A unit of cooperative work. `run` must return without blocking; long jobs
/// are split across invocations.
pub trait Task {
    /// Execute one slice of work at tick `now`
    fn run(&mut self, now: Tick);
}

impl<F> Task for F
where
    F: FnMut(Tick),
{
    fn run(&mut self, now: Tick) {
        self(now)
    }
}

/// Handle to a registered task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(usize);

impl TaskId {
    /// Position in the table (also the dispatch order)
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Per-task diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    /// Completed executions
    pub runs: u32,
    /// Executions whose own duration reached the period
    pub overruns: u32,
    /// Periods that passed without the task getting a turn
    pub skipped_slots: u32,
    /// Ticks spent in the most recent execution
    pub last_duration: Tick,
}

/// A slot in the task table
struct ScheduledTask<'a> {
    name: &'static str,
    /// Period in ticks
    period: Tick,
    /// Tick recorded after the previous execution
    last_run: Tick,
    enabled: bool,
    body: &'a mut dyn Task,
    stats: TaskStats,
}

/// Collects tasks before the loop starts. Registration is only possible
/// here; [`SchedulerBuilder::build`] freezes the table.
pub struct SchedulerBuilder<'a, const N: usize> {
    clock: &'a TickCounter,
    tasks: [Option<ScheduledTask<'a>>; N],
    len: usize,
}

impl<'a, const N: usize> SchedulerBuilder<'a, N> {
    /// Create an empty table timed by `clock`
    pub fn new(clock: &'a TickCounter) -> Self {
        Self {
            clock,
            tasks: std::array::from_fn(|_| None),
            len: 0,
        }
    }

    /// Append a task; it first becomes due `period` ticks from now
    pub fn register(
        &mut self,
        name: &'static str,
        period: Tick,
        body: &'a mut dyn Task,
    ) -> Result<TaskId, SchedulerError> {
        if period == 0 {
            return Err(SchedulerError::ZeroPeriod(name));
        }
        if self.len == N {
            return Err(SchedulerError::TableFull { name, capacity: N });
        }

        let id = TaskId(self.len);
        self.tasks[self.len] = Some(ScheduledTask {
            name,
            period,
            last_run: self.clock.now(),
            enabled: true,
            body,
            stats: TaskStats::default(),
        });
        self.len += 1;

        debug!("Registered task '{}' (period {} ticks) at slot {}", name, period, id.0);
        Ok(id)
    }

    /// Freeze the table and hand it to the dispatcher
    pub fn build(self) -> Scheduler<'a, N> {
        info!("Task scheduler created with {} of {} slots", self.len, N);
        Scheduler {
            clock: self.clock,
            tasks: self.tasks,
            len: self.len,
        }
    }
}

/// Cooperative dispatcher over a frozen task table
pub struct Scheduler<'a, const N: usize> {
    clock: &'a TickCounter,
    tasks: [Option<ScheduledTask<'a>>; N],
    len: usize,
}

impl<'a, const N: usize> Scheduler<'a, N> {
    /// Check every enabled task once, in table order, running those that are
    /// due. Returns the number of tasks executed.
    ///
    /// A late task runs once and is re-anchored at its completion tick;
    /// missed periods are counted, never replayed.
    pub fn run_pass(&mut self) -> usize {
        let clock = self.clock;
        let mut ran = 0;

        for task in self.tasks.iter_mut().flatten() {
            if !task.enabled {
                continue;
            }

            let now = clock.now();
            let since = elapsed(now, task.last_run);
            if since < task.period {
                continue;
            }

            let missed = since / task.period - 1;
            if missed > 0 {
                task.stats.skipped_slots = task.stats.skipped_slots.saturating_add(missed);
                debug!("Task '{}' late by {} periods", task.name, missed);
            }

            task.body.run(now);

            let finished = clock.now();
            let duration = elapsed(finished, now);
            task.last_run = finished;
            task.stats.runs = task.stats.runs.wrapping_add(1);
            task.stats.last_duration = duration;

            if duration >= task.period {
                task.stats.overruns = task.stats.overruns.saturating_add(1);
                warn!(
                    "Task '{}' overran: took {} ticks for a {} tick period",
                    task.name, duration, task.period
                );
            }
            ran += 1;
        }
        ran
    }

    /// Dispatch forever
    pub fn run(&mut self) -> ! {
        info!("Starting task scheduler");
        loop {
            self.run_pass();
        }
    }

    /// Dispatch until `ticks` have elapsed (host simulation and tests)
    pub fn run_for(&mut self, ticks: Tick) -> u64 {
        info!("Running task scheduler for {} ticks", ticks);
        let start = self.clock.now();
        let mut passes = 0u64;
        while elapsed(self.clock.now(), start) < ticks {
            self.run_pass();
            passes += 1;
            std::hint::spin_loop();
        }
        info!("Task scheduler stopped after {} passes", passes);
        passes
    }

    /// Allow a task to be dispatched again; it waits a full period first
    pub fn enable(&mut self, id: TaskId) -> Result<(), SchedulerError> {
        let now = self.clock.now();
        let task = self.slot_mut(id)?;
        if !task.enabled {
            task.enabled = true;
            task.last_run = now;
            debug!("Enabled task '{}'", task.name);
        }
        Ok(())
    }

    /// Stop dispatching a task. It stays in the table.
    pub fn disable(&mut self, id: TaskId) -> Result<(), SchedulerError> {
        let task = self.slot_mut(id)?;
        task.enabled = false;
        debug!("Disabled task '{}'", task.name);
        Ok(())
    }

    /// Whether the task is currently dispatched
    pub fn is_enabled(&self, id: TaskId) -> Result<bool, SchedulerError> {
        self.slot(id).map(|task| task.enabled)
    }

    /// Diagnostics for one task
    pub fn stats(&self, id: TaskId) -> Result<TaskStats, SchedulerError> {
        self.slot(id).map(|task| task.stats)
    }

    /// Name and diagnostics of every task, in dispatch order
    pub fn summary(&self) -> Vec<(&'static str, TaskStats)> {
        self.tasks
            .iter()
            .flatten()
            .map(|task| (task.name, task.stats))
            .collect()
    }

    /// Number of registered tasks
    pub fn task_count(&self) -> usize {
        self.len
    }

    fn slot(&self, id: TaskId) -> Result<&ScheduledTask<'a>, SchedulerError> {
        self.tasks
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(SchedulerError::UnknownTask(id.0))
    }

    fn slot_mut(&mut self, id: TaskId) -> Result<&mut ScheduledTask<'a>, SchedulerError> {
        self.tasks
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(SchedulerError::UnknownTask(id.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_periodic_execution_over_100_periods() {
        const PERIOD: Tick = 7;
        let clock = TickCounter::new();
        let mut driver = clock.take_driver().unwrap();

        let mut executed_at: Vec<Tick> = Vec::new();
        let mut task = |now: Tick| executed_at.push(now);

        let mut builder = SchedulerBuilder::<4>::new(&clock);
        let id = builder.register("periodic", PERIOD, &mut task).unwrap();
        let mut scheduler = builder.build();

        for _ in 0..(PERIOD * 100) {
            driver.advance();
            scheduler.run_pass();
        }

        let stats = scheduler.stats(id).unwrap();
        assert_eq!(stats.runs, 100);
        assert_eq!(stats.skipped_slots, 0);
        drop(scheduler);

        let expected: Vec<Tick> = (1..=100).map(|k| k * PERIOD).collect();
        assert_eq!(executed_at, expected);
    }

    #[test]
    fn test_table_order_is_dispatch_order() {
        let clock = TickCounter::new();
        let mut driver = clock.take_driver().unwrap();
        let order = RefCell::new(Vec::new());

        let mut first = |_: Tick| order.borrow_mut().push("first");
        let mut second = |_: Tick| order.borrow_mut().push("second");

        let mut builder = SchedulerBuilder::<2>::new(&clock);
        builder.register("first", 1, &mut first).unwrap();
        builder.register("second", 1, &mut second).unwrap();
        let mut scheduler = builder.build();

        driver.advance();
        assert_eq!(scheduler.run_pass(), 2);
        drop(scheduler);

        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_late_task_runs_once_and_counts_skips() {
        let clock = TickCounter::new();
        let mut driver = clock.take_driver().unwrap();
        let mut runs = 0;
        let mut task = |_: Tick| runs += 1;

        let mut builder = SchedulerBuilder::<1>::new(&clock);
        let id = builder.register("slow-poll", 10, &mut task).unwrap();
        let mut scheduler = builder.build();

        // Loop stalled for 35 ticks: three periods elapsed, two were missed
        driver.advance_by(35);
        assert_eq!(scheduler.run_pass(), 1);
        assert_eq!(scheduler.run_pass(), 0);

        // Re-anchored at tick 35, so next due at 45
        driver.advance_by(9);
        assert_eq!(scheduler.run_pass(), 0);
        driver.advance();
        assert_eq!(scheduler.run_pass(), 1);

        let stats = scheduler.stats(id).unwrap();
        assert_eq!(stats.runs, 2);
        assert_eq!(stats.skipped_slots, 2);
        drop(scheduler);
        assert_eq!(runs, 2);
    }

    #[test]
    fn test_overrun_is_recorded_not_fatal() {
        let clock = TickCounter::new();
        let driver = RefCell::new(clock.take_driver().unwrap());

        // Body burns 6 ticks against a 5 tick period
        let mut task = |_: Tick| {
            driver.borrow_mut().advance_by(6);
        };

        let mut builder = SchedulerBuilder::<1>::new(&clock);
        let id = builder.register("hog", 5, &mut task).unwrap();
        let mut scheduler = builder.build();

        driver.borrow_mut().advance_by(5);
        assert_eq!(scheduler.run_pass(), 1);

        let stats = scheduler.stats(id).unwrap();
        assert_eq!(stats.overruns, 1);
        assert_eq!(stats.last_duration, 6);

        // last_run is the completion tick (11), so it is due again at 16
        driver.borrow_mut().advance_by(4);
        assert_eq!(scheduler.run_pass(), 0);
        driver.borrow_mut().advance();
        assert_eq!(scheduler.run_pass(), 1);
    }

    #[test]
    fn test_disabled_task_never_runs() {
        let clock = TickCounter::new();
        let mut driver = clock.take_driver().unwrap();
        let mut runs = 0;
        let mut task = |_: Tick| runs += 1;

        let mut builder = SchedulerBuilder::<1>::new(&clock);
        let id = builder.register("blinker", 2, &mut task).unwrap();
        let mut scheduler = builder.build();

        scheduler.disable(id).unwrap();
        assert!(!scheduler.is_enabled(id).unwrap());
        for _ in 0..20 {
            driver.advance();
            scheduler.run_pass();
        }
        assert_eq!(scheduler.stats(id).unwrap().runs, 0);

        scheduler.enable(id).unwrap();
        driver.advance_by(2);
        assert_eq!(scheduler.run_pass(), 1);
        drop(scheduler);
        assert_eq!(runs, 1);
    }

    #[test]
    fn test_registration_errors() {
        let clock = TickCounter::new();
        let mut a = |_: Tick| {};
        let mut b = |_: Tick| {};
        let mut c = |_: Tick| {};

        let mut builder = SchedulerBuilder::<1>::new(&clock);
        assert_eq!(
            builder.register("zero", 0, &mut a).unwrap_err(),
            SchedulerError::ZeroPeriod("zero")
        );
        builder.register("ok", 1, &mut b).unwrap();
        assert_eq!(
            builder.register("extra", 1, &mut c).unwrap_err(),
            SchedulerError::TableFull {
                name: "extra",
                capacity: 1
            }
        );

        let scheduler = builder.build();
        assert_eq!(scheduler.task_count(), 1);
        assert_eq!(
            scheduler.stats(TaskId(3)).unwrap_err(),
            SchedulerError::UnknownTask(3)
        );
    }

    #[test]
    fn test_period_across_tick_wrap() {
        let clock = TickCounter::starting_at(u32::MAX - 1);
        let mut driver = clock.take_driver().unwrap();
        let mut runs = 0;
        let mut task = |_: Tick| runs += 1;

        let mut builder = SchedulerBuilder::<1>::new(&clock);
        builder.register("wrap", 4, &mut task).unwrap();
        let mut scheduler = builder.build();

        for _ in 0..3 {
            driver.advance();
            assert_eq!(scheduler.run_pass(), 0);
        }
        driver.advance();
        assert_eq!(scheduler.run_pass(), 1);
        drop(scheduler);
        assert_eq!(runs, 1);
    }
}
