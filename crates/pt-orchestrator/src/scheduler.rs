//! Second-stage launch timing
//!
//! Flow `i` (0-based) starts `i * interval` after the first one; the whole
//! run lasts `runtime` from the first start, after which both managers
//! are halted.

use std::time::Duration;

use tokio::time::Instant;

use pt_core::config::{ExperimentConfig, FeasibilityCheck};
use pt_core::time::format_time;
use pt_core::traits::ManagerLink;
use pt_core::{ExperimentError, ExperimentResult};

use crate::flows::QueuedLaunch;
use crate::manager::ManagerPair;

/// Timing parameters of a run
#[derive(Debug, Clone, Copy)]
pub struct ScheduleParams {
    pub settle_delay: Duration,
    pub interval: Duration,
    pub runtime: Duration,
    pub feasibility: FeasibilityCheck,
}

impl ScheduleParams {
    pub fn from_config(config: &ExperimentConfig) -> Self {
        Self {
            settle_delay: config.schedule.settle_delay,
            interval: config.interval,
            runtime: config.runtime,
            feasibility: config.schedule.feasibility,
        }
    }

    /// Issuing must finish strictly before the runtime is over
    pub fn check(&self, elapsed: Duration, phase: &'static str) -> Result<(), ExperimentError> {
        if elapsed < self.runtime {
            Ok(())
        } else {
            Err(ExperimentError::SchedulingInfeasible {
                elapsed,
                runtime: self.runtime,
                phase,
            })
        }
    }

    /// Offset of the last start relative to the first
    pub fn predicted_elapsed(&self, launches: usize) -> Duration {
        let gaps = launches.saturating_sub(1) as u32;
        self.interval * gaps
    }
}

/// Issues queued launches on schedule and ends the run
pub struct TimingScheduler {
    params: ScheduleParams,
}

impl TimingScheduler {
    pub fn new(params: ScheduleParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ScheduleParams {
        &self.params
    }

    /// Start every queued program, wait out the runtime, halt the managers
    pub async fn run<M: ManagerLink>(
        &self,
        managers: &mut ManagerPair<M>,
        launches: &[QueuedLaunch],
        result: &mut ExperimentResult,
    ) -> Result<(), ExperimentError> {
        let params = &self.params;

        if params.feasibility == FeasibilityCheck::Before {
            let predicted = params.predicted_elapsed(launches.len());
            if let Err(e) = params.check(predicted, "predicted") {
                tracing::warn!(
                    "Not starting any of {} flows: offsets need {:?} of a {:?} runtime \
                     (an after-issue check would have started them first)",
                    launches.len(),
                    predicted,
                    params.runtime
                );
                return Err(e);
            }
        }

        tokio::time::sleep(params.settle_delay).await;

        let start = Instant::now();
        result.test_start_time = Some(format_time());

        for (i, launch) in launches.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(params.interval).await;
            }
            tracing::info!("Starting flow {} on the {}", launch.tunnel, launch.manager);
            managers.send(launch.manager, launch.command.clone()).await?;
        }

        let elapsed = start.elapsed();
        if let Err(e) = params.check(elapsed, "issued") {
            tracing::warn!(
                "All {} flows were already started when the schedule overran ({} check)",
                launches.len(),
                params.feasibility
            );
            return Err(e);
        }

        tokio::time::sleep(params.runtime - elapsed).await;

        managers.halt_all().await?;
        result.test_end_time = Some(format_time());
        tracing::info!("Experiment finished after {:?}", start.elapsed());
        Ok(())
    }
}
