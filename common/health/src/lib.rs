use std::collections::HashMap;
use std::ops::Add;
use std::sync::{Arc, RwLock};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use time::Duration;

// Health reporting for components of a service.
//
// Long-running loops register themselves with a deadline and must keep
// reporting healthy before it elapses; a component that stops reporting is
// considered stalled and fails the probe. Liveness and readiness should use
// separate registries rather than share one.

#[derive(Default, Debug)]
pub struct HealthStatus {
    /// The overall status: true if all components are healthy
    pub healthy: bool,
    /// Current status of each registered component, for display
    pub components: HashMap<String, ComponentStatus>,
}

impl IntoResponse for HealthStatus {
    /// Computes the axum status code based on the overall health status,
    /// and prints each component status in the body for debugging.
    fn into_response(self) -> Response {
        let body = format!("{:?}", self);
        match self.healthy {
            true => (StatusCode::OK, body),
            false => (StatusCode::INTERNAL_SERVER_ERROR, body),
        }
        .into_response()
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ComponentStatus {
    /// Automatically set when a component is newly registered
    Starting,
    /// Recently reported healthy, will need to report again before the date
    HealthyUntil(time::OffsetDateTime),
    /// Reported unhealthy
    Unhealthy,
    /// Automatically set when the HealthyUntil deadline is reached
    Stalled,
}

impl ComponentStatus {
    fn evaluate(&self, now: time::OffsetDateTime) -> ComponentStatus {
        match self {
            ComponentStatus::HealthyUntil(until) if *until <= now => ComponentStatus::Stalled,
            other => other.clone(),
        }
    }
}

type ComponentMap = Arc<RwLock<HashMap<String, ComponentStatus>>>;

pub struct HealthHandle {
    component: String,
    deadline: Duration,
    components: ComponentMap,
}

impl HealthHandle {
    /// Report healthy. Must be called more frequently than the deadline
    /// given at registration.
    pub fn report_healthy(&self) {
        self.report_status(ComponentStatus::HealthyUntil(
            time::OffsetDateTime::now_utc().add(self.deadline),
        ))
    }

    pub fn report_unhealthy(&self) {
        self.report_status(ComponentStatus::Unhealthy)
    }

    pub fn report_status(&self, status: ComponentStatus) {
        if status == ComponentStatus::Unhealthy {
            tracing::warn!("component {} reported unhealthy", self.component);
        }
        if let Ok(mut components) = self.components.write() {
            components.insert(self.component.clone(), status);
        }
    }
}

#[derive(Clone, Default)]
pub struct HealthRegistry {
    components: ComponentMap,
}

impl HealthRegistry {
    pub fn new() -> HealthRegistry {
        Self::default()
    }

    /// Register a new component. The returned handle must report healthy
    /// at least once per deadline period for the probe to pass.
    pub fn register(&self, component: String, deadline: Duration) -> HealthHandle {
        if let Ok(mut components) = self.components.write() {
            components.insert(component.clone(), ComponentStatus::Starting);
        }
        tracing::info!("registered new component {} with deadline {}", component, deadline);

        HealthHandle {
            component,
            deadline,
            components: self.components.clone(),
        }
    }

    pub fn get_status(&self) -> HealthStatus {
        let now = time::OffsetDateTime::now_utc();
        let components: HashMap<String, ComponentStatus> = match self.components.read() {
            Ok(components) => components
                .iter()
                .map(|(name, status)| (name.clone(), status.evaluate(now)))
                .collect(),
            Err(_) => {
                return HealthStatus {
                    healthy: false,
                    components: HashMap::new(),
                }
            }
        };

        let healthy = components
            .values()
            .all(|status| matches!(status, ComponentStatus::HealthyUntil(_)));

        HealthStatus {
            healthy,
            components,
        }
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use crate::{ComponentStatus, HealthRegistry};

    #[test]
    fn starting_components_fail_the_probe() {
        let registry = HealthRegistry::new();
        let _handle = registry.register(String::from("worker"), Duration::seconds(30));

        let status = registry.get_status();
        assert!(!status.healthy);
        assert_eq!(
            status.components.get("worker"),
            Some(&ComponentStatus::Starting)
        );
    }

    #[test]
    fn healthy_components_pass_the_probe() {
        let registry = HealthRegistry::new();
        let handle = registry.register(String::from("worker"), Duration::seconds(30));

        handle.report_healthy();
        assert!(registry.get_status().healthy);
    }

    #[test]
    fn unhealthy_report_fails_the_probe() {
        let registry = HealthRegistry::new();
        let handle = registry.register(String::from("worker"), Duration::seconds(30));

        handle.report_healthy();
        handle.report_unhealthy();

        let status = registry.get_status();
        assert!(!status.healthy);
        assert_eq!(
            status.components.get("worker"),
            Some(&ComponentStatus::Unhealthy)
        );
    }

    #[test]
    fn stale_reports_become_stalled() {
        let registry = HealthRegistry::new();
        let handle = registry.register(String::from("worker"), Duration::seconds(-1));

        // Deadline already in the past when the report lands.
        handle.report_healthy();

        let status = registry.get_status();
        assert!(!status.healthy);
        assert_eq!(
            status.components.get("worker"),
            Some(&ComponentStatus::Stalled)
        );
    }

    #[test]
    fn one_bad_component_fails_the_whole_probe() {
        let registry = HealthRegistry::new();
        let good = registry.register(String::from("good"), Duration::seconds(30));
        let bad = registry.register(String::from("bad"), Duration::seconds(30));

        good.report_healthy();
        bad.report_unhealthy();

        assert!(!registry.get_status().healthy);
    }
}
