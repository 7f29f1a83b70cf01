//! OS-native execution backends and the router that picks between them.
//!
//! Mirrors the executor/router split: a primary backend is chosen from the
//! running platform, and any `unsupported` result it returns is retried on
//! the generic backend, with `fallback_from` recorded in the details so a
//! caller can tell a true unsupported-intent from a platform gap.

mod generic;
mod macos;
mod windows;

use crate::types::{ExecutionResult, ExecutionStatus, Step, Target};
use async_trait::async_trait;
use std::time::Instant;

#[async_trait]
pub trait OsExecutor: Send + Sync {
    async fn execute_step(&self, step: &Step) -> ExecutionResult;
}

pub struct OsRouter {
    macos: macos::MacosExecutor,
    windows: windows::WindowsExecutor,
    generic: generic::GenericExecutor,
}

impl OsRouter {
    pub fn new() -> Self {
        Self {
            macos: macos::MacosExecutor,
            windows: windows::WindowsExecutor,
            generic: generic::GenericExecutor::new(),
        }
    }
}

impl Default for OsRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OsExecutor for OsRouter {
    async fn execute_step(&self, step: &Step) -> ExecutionResult {
        let os_name = std::env::consts::OS;
        let primary: Option<&(dyn OsExecutor)> = match os_name {
            "macos" => Some(&self.macos),
            "windows" => Some(&self.windows),
            _ => None,
        };

        let Some(primary) = primary else {
            return self.generic.execute_step(step).await;
        };

        let result = primary.execute_step(step).await;
        if result.status != ExecutionStatus::Unsupported {
            return result;
        }

        let mut fallback_result = self.generic.execute_step(step).await;
        let mut details = fallback_result.details.unwrap_or_else(|| serde_json::json!({}));
        if let Some(obj) = details.as_object_mut() {
            obj.insert("fallback_from".to_string(), serde_json::Value::String(os_name.to_string()));
        }
        fallback_result.details = Some(details);
        fallback_result
    }
}

fn ok(intent: crate::types::Intent, target: Target, start: Instant) -> ExecutionResult {
    ExecutionResult::ok(intent, target).with_elapsed(start.elapsed().as_millis() as u64)
}

fn failed(intent: crate::types::Intent, target: Target, reason: impl Into<String>, start: Instant) -> ExecutionResult {
    ExecutionResult::failed(intent, target, serde_json::json!({ "reason": reason.into() })).with_elapsed(start.elapsed().as_millis() as u64)
}

fn unsupported(intent: crate::types::Intent, target: Target, reason: impl Into<String>, start: Instant) -> ExecutionResult {
    let mut result = ExecutionResult::unsupported(intent, target).with_elapsed(start.elapsed().as_millis() as u64);
    result.details = Some(serde_json::json!({ "reason": reason.into() }));
    result
}
