//! Per-iteration timing of Jacobian assembly and multigrid solves, compiled in with the
//! `timing` feature. Without it every function here is a no-op.
#![allow(unused)]
use std::cell::RefCell;
use std::time::{Duration, Instant};

use log::{debug, info};

/// Timed stage of a Newton iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Assembly,
    LinearSolve,
}

#[derive(Debug, Default, Clone)]
pub struct NewtonTimings {
    pub assembly: Vec<Duration>,
    pub linear_solve: Vec<Duration>,
    pub total: Duration,
}

impl NewtonTimings {
    fn phase_mut(&mut self, phase: Phase) -> &mut Vec<Duration> {
        match phase {
            Phase::Assembly => &mut self.assembly,
            Phase::LinearSolve => &mut self.linear_solve,
        }
    }

    pub fn log(&self) {
        if self.assembly.is_empty() {
            return;
        }
        let ms = |d: Duration| d.as_secs_f64() * 1000.0;
        let assembly: Duration = self.assembly.iter().sum();
        let linear: Duration = self.linear_solve.iter().sum();

        info!(
            "Newton timing: {:.3} s total, assembly {:.3} ms over {} iteration(s), \
             multigrid {:.3} ms over {} solve(s), other {:.3} ms",
            self.total.as_secs_f64(),
            ms(assembly),
            self.assembly.len(),
            ms(linear),
            self.linear_solve.len(),
            ms(self.total.saturating_sub(assembly + linear)),
        );
        for (k, (a, l)) in self.assembly.iter().zip(&self.linear_solve).enumerate() {
            debug!("  iteration {:>3}: assembly {:>8.1} ms, multigrid {:>8.1} ms", k + 1, ms(*a), ms(*l));
        }
    }
}

#[cfg(feature = "timing")]
thread_local! {
    static TIMINGS: RefCell<NewtonTimings> = RefCell::new(NewtonTimings::default());
}

#[cfg(feature = "timing")]
pub fn reset_timing() {
    TIMINGS.with(|t| *t.borrow_mut() = NewtonTimings::default());
}

#[cfg(not(feature = "timing"))]
pub fn reset_timing() {}

#[cfg(feature = "timing")]
pub fn record<R>(phase: Phase, f: impl FnOnce() -> R) -> R {
    let start = Instant::now();
    let result = f();
    let elapsed = start.elapsed();
    TIMINGS.with(|t| t.borrow_mut().phase_mut(phase).push(elapsed));
    result
}

#[cfg(not(feature = "timing"))]
pub fn record<R>(_phase: Phase, f: impl FnOnce() -> R) -> R {
    f()
}

#[cfg(feature = "timing")]
pub fn finish_timing(total: Duration) -> NewtonTimings {
    TIMINGS.with(|t| {
        let mut timings = t.borrow_mut();
        timings.total = total;
        timings.clone()
    })
}

#[cfg(not(feature = "timing"))]
pub fn finish_timing(_total: Duration) -> NewtonTimings {
    NewtonTimings::default()
}

/// Closes the current Newton solve and logs its timings.
pub fn finish_and_log(total: Duration) {
    finish_timing(total).log();
}

#[cfg(all(test, feature = "timing"))]
mod tests {
    use super::*;

    #[test]
    fn records_both_phases() {
        reset_timing();
        let value = record(Phase::Assembly, || 2);
        record(Phase::LinearSolve, || ());
        let timings = finish_timing(Duration::from_millis(5));
        assert_eq!(value, 2);
        assert_eq!(timings.assembly.len(), 1);
        assert_eq!(timings.linear_solve.len(), 1);
        assert_eq!(timings.total, Duration::from_millis(5));
    }
}
