//! Service control adapter — translates lifecycle verbs into systemctl
//! invocations through the execution engine.
//!
//! The command is built as an argument vector, never an interpolated shell
//! string, so a service name can only ever be an argument to systemctl.

use std::str::FromStr;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::exec::{ExecutionResult, Executor};

/// The closed set of supported lifecycle verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Status,
    Enable,
    Disable,
}

impl ServiceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
            ServiceAction::Restart => "restart",
            ServiceAction::Status => "status",
            ServiceAction::Enable => "enable",
            ServiceAction::Disable => "disable",
        }
    }
}

impl FromStr for ServiceAction {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(ServiceAction::Start),
            "stop" => Ok(ServiceAction::Stop),
            "restart" => Ok(ServiceAction::Restart),
            "status" => Ok(ServiceAction::Status),
            "enable" => Ok(ServiceAction::Enable),
            "disable" => Ok(ServiceAction::Disable),
            other => Err(GatewayError::MalformedRequest(format!(
                "invalid service action: {other}"
            ))),
        }
    }
}

pub struct ServiceControl {
    executor: Arc<Executor>,
}

impl ServiceControl {
    pub fn new(executor: Arc<Executor>) -> Self {
        Self { executor }
    }

    /// Run `systemctl <action> <service>`, inheriting the executor's
    /// timeout and outcome semantics. The service name is an argument, not
    /// a path, so it is not separately policy-checked — but `systemctl`
    /// itself must be on the command allow-list.
    pub async fn manage(
        &self,
        service: &str,
        action: ServiceAction,
    ) -> Result<ExecutionResult, GatewayError> {
        if service.is_empty() {
            return Err(GatewayError::MalformedRequest(
                "service name must not be empty".to_string(),
            ));
        }

        let argv = systemctl_argv(action, service);
        self.executor.execute_argv(&argv, None, None).await
    }

    /// Probe whether a unit is active. Used by health_check; a short,
    /// fixed timeout keeps a wedged systemd from stalling the probe.
    pub async fn is_active(
        &self,
        service: &str,
        timeout_secs: u64,
    ) -> Result<ExecutionResult, GatewayError> {
        let argv = vec![
            "systemctl".to_string(),
            "is-active".to_string(),
            service.to_string(),
        ];
        self.executor.execute_argv(&argv, None, Some(timeout_secs)).await
    }
}

fn systemctl_argv(action: ServiceAction, service: &str) -> Vec<String> {
    vec![
        "systemctl".to_string(),
        action.as_str().to_string(),
        service.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExecConfig, PolicyConfig};
    use crate::policy::Policy;

    #[test]
    fn test_action_parse() {
        for (s, action) in [
            ("start", ServiceAction::Start),
            ("stop", ServiceAction::Stop),
            ("restart", ServiceAction::Restart),
            ("status", ServiceAction::Status),
            ("enable", ServiceAction::Enable),
            ("disable", ServiceAction::Disable),
        ] {
            assert_eq!(s.parse::<ServiceAction>().unwrap(), action);
            assert_eq!(action.as_str(), s);
        }
    }

    #[test]
    fn test_unknown_action_rejected() {
        for bad in ["reload", "Start", "", "start stop"] {
            assert!(matches!(
                bad.parse::<ServiceAction>(),
                Err(GatewayError::MalformedRequest(_))
            ));
        }
    }

    #[test]
    fn test_argv_shape() {
        let argv = systemctl_argv(ServiceAction::Restart, "nginx");
        assert_eq!(argv, ["systemctl", "restart", "nginx"]);
    }

    #[tokio::test]
    async fn test_systemctl_must_be_allow_listed() {
        let policy = Arc::new(Policy::from_config(&PolicyConfig {
            allowed_paths: vec![],
            denied_paths: vec![],
            allowed_commands: vec!["echo".to_string()],
        }));
        let executor = Arc::new(Executor::new(policy, &ExecConfig::default()));
        let control = ServiceControl::new(executor);

        let err = control
            .manage("nginx", ServiceAction::Status)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::PolicyDenied(_)));
    }

    #[tokio::test]
    async fn test_empty_service_name_rejected() {
        let policy = Arc::new(Policy::from_config(&PolicyConfig::default()));
        let executor = Arc::new(Executor::new(policy, &ExecConfig::default()));
        let control = ServiceControl::new(executor);

        let err = control
            .manage("", ServiceAction::Start)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::MalformedRequest(_)));
    }
}
