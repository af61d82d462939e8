//! System lifecycle (spec §5): initialize → ready → start → running →
//! stop → stopped → shutdown, with a restart counter and periodic health
//! checks — grounded on the teacher's pause/resume/status surface in
//! `autopilot::engine::AutopilotEngine` (`pause_autopilot`, `resume_autopilot`,
//! `get_status`), adapted from a scheduler-specific pause to a full
//! start/stop state machine.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Error, PartialEq)]
pub enum LifecycleError {
    #[error("invalid lifecycle transition from {from:?} to {to:?}")]
    InvalidTransition { from: Phase, to: Phase },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Ready,
    Running,
    Stopped,
    ShutDown,
}

impl Phase {
    fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Uninitialized, Ready)
                | (Ready, Running)
                | (Running, Stopped)
                | (Stopped, Running)
                | (Stopped, ShutDown)
                | (Ready, ShutDown)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone)]
pub struct LifecycleSnapshot {
    pub phase: Phase,
    pub health: HealthStatus,
    pub restart_count: u32,
    pub unhealthy_components: Vec<String>,
}

/// The period health is expected to be sampled at, per spec §5.
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

struct State {
    phase: Phase,
    health: HealthStatus,
    restart_count: u32,
    unhealthy_components: Vec<String>,
}

/// Tracks the coarse phase of the running system. Component failures are
/// reported via `mark_unhealthy` and degrade `health` without forcing a
/// phase transition — an unhealthy system keeps running.
pub struct Lifecycle {
    state: RwLock<State>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            state: RwLock::new(State {
                phase: Phase::Uninitialized,
                health: HealthStatus::Healthy,
                restart_count: 0,
                unhealthy_components: Vec::new(),
            }),
        }
    }
}

impl Lifecycle {
    async fn transition(&self, next: Phase) -> Result<(), LifecycleError> {
        let mut state = self.state.write().await;
        if !state.phase.can_transition_to(next) {
            return Err(LifecycleError::InvalidTransition {
                from: state.phase,
                to: next,
            });
        }
        info!(from = ?state.phase, to = ?next, "lifecycle transition");
        state.phase = next;
        Ok(())
    }

    pub async fn initialize(&self) -> Result<(), LifecycleError> {
        self.transition(Phase::Ready).await
    }

    pub async fn start(&self) -> Result<(), LifecycleError> {
        self.transition(Phase::Running).await
    }

    /// `graceful` only affects what the caller logs; both paths converge
    /// on `Stopped` immediately since in-flight work here is all
    /// short-lived per-call resolution, not a long-running server loop.
    pub async fn stop(&self, graceful: bool) -> Result<(), LifecycleError> {
        if !graceful {
            warn!("non-graceful stop requested");
        }
        self.transition(Phase::Stopped).await
    }

    pub async fn shutdown(&self) -> Result<(), LifecycleError> {
        self.transition(Phase::ShutDown).await
    }

    /// Re-enters `Running` from `Stopped` and increments the restart
    /// counter; the counter itself is never reset.
    pub async fn restart(&self) -> Result<u32, LifecycleError> {
        self.transition(Phase::Running).await?;
        let mut state = self.state.write().await;
        state.restart_count += 1;
        Ok(state.restart_count)
    }

    pub async fn mark_unhealthy(&self, component: impl Into<String>) {
        let component = component.into();
        let mut state = self.state.write().await;
        if !state.unhealthy_components.contains(&component) {
            warn!(component = %component, "component marked unhealthy");
            state.unhealthy_components.push(component);
        }
        state.health = HealthStatus::Unhealthy;
    }

    pub async fn mark_healthy(&self, component: &str) {
        let mut state = self.state.write().await;
        state.unhealthy_components.retain(|c| c != component);
        if state.unhealthy_components.is_empty() {
            state.health = HealthStatus::Healthy;
        }
    }

    pub async fn snapshot(&self) -> LifecycleSnapshot {
        let state = self.state.read().await;
        LifecycleSnapshot {
            phase: state.phase,
            health: state.health,
            restart_count: state.restart_count,
            unhealthy_components: state.unhealthy_components.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn happy_path_transitions_in_order() {
        let lifecycle = Lifecycle::default();
        lifecycle.initialize().await.unwrap();
        lifecycle.start().await.unwrap();
        lifecycle.stop(true).await.unwrap();
        lifecycle.shutdown().await.unwrap();
        assert_eq!(lifecycle.snapshot().await.phase, Phase::ShutDown);
    }

    #[tokio::test]
    async fn running_cannot_skip_straight_to_shutdown() {
        let lifecycle = Lifecycle::default();
        lifecycle.initialize().await.unwrap();
        lifecycle.start().await.unwrap();
        let err = lifecycle.shutdown().await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn restart_increments_counter_without_resetting() {
        let lifecycle = Lifecycle::default();
        lifecycle.initialize().await.unwrap();
        lifecycle.start().await.unwrap();
        lifecycle.stop(true).await.unwrap();
        assert_eq!(lifecycle.restart().await.unwrap(), 1);
        lifecycle.stop(true).await.unwrap();
        assert_eq!(lifecycle.restart().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn unhealthy_component_does_not_block_operation() {
        let lifecycle = Lifecycle::default();
        lifecycle.initialize().await.unwrap();
        lifecycle.start().await.unwrap();
        lifecycle.mark_unhealthy("storage").await;
        let snapshot = lifecycle.snapshot().await;
        assert_eq!(snapshot.health, HealthStatus::Unhealthy);
        assert_eq!(snapshot.phase, Phase::Running);
    }
}
