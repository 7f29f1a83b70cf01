mod applescript;
mod cache;
mod config;
mod confirmation;
mod context;
mod controller;
mod engine;
mod error;
mod fallback;
mod llm;
mod os_backend;
mod persistence;
mod resolver;
mod router;
mod safety;
mod schema;
mod subject;
mod types;
mod web_adapters;
mod web_constants;
mod web_executor;

use config::Config;
use controller::{Controller, InboundEvent};
use engine::CommandEngine;
use fallback::FallbackChainConfig;
use llm::LocalLlmInterpreter;
use persistence::{gesture_commands_path, load_gesture_commands};
use resolver::UrlResolver;
use router::CommandRouter;
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;
use types::CommandSource;
use web_executor::WebExecutor;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();
    tracing::info!(?config, "starting local command dispatch service");

    if let Err(e) = std::fs::create_dir_all(&config.user_data_dir) {
        tracing::warn!(error = %e, "failed to create user data directory");
    }

    let gestures_path = gesture_commands_path(&config.user_data_dir);
    let gestures = load_gesture_commands(&gestures_path).unwrap_or_default();

    let resolver = Arc::new(UrlResolver::new(config.user_data_dir.join("resolver-profile"), config.search_engine_url_template.clone()));

    let fallback_config = FallbackChainConfig {
        enable_search_fallback: config.enable_search_fallback,
        enable_homepage_fallback: config.enable_homepage_fallback,
        search_engine_url_template: config.search_engine_url_template.clone(),
    };

    let web_executor = WebExecutor::new(
        config.user_data_dir.join("web-profile"),
        config.browser_headless,
        resolver.clone(),
        fallback_config,
        config.enable_web_fill_form,
        config.user_data_dir.clone(),
    );

    let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "llama3".to_string());
    let interpreter = LocalLlmInterpreter::new(config.llm_endpoint.clone(), model, Duration::from_millis(config.llm_timeout_ms));

    let router = CommandRouter::new(Box::new(web_executor));
    let engine = Arc::new(CommandEngine::new(interpreter, router));

    let command_timeout = Some(Duration::from_millis(config.command_timeout_ms));
    let controller = Controller::spawn(engine, gestures, config.queue_capacity, command_timeout);

    tracing::info!("reading voice/gesture actions from stdin as \"source action [json payload]\" lines; ctrl-d to exit");
    read_stdin_events(&controller);
}

/// Minimal line-oriented harness for feeding events into the queue. The
/// gesture daemon and voice listener that normally populate this channel are
/// separate processes outside this crate; this loop stands in for them so
/// the dispatcher is runnable on its own.
fn read_stdin_events(controller: &Controller) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.splitn(3, ' ');
        let source = match parts.next() {
            Some("gesture") => CommandSource::Gesture,
            Some("voice") => CommandSource::Voice,
            _ => {
                tracing::warn!(%line, "expected a leading \"gesture\" or \"voice\" source tag");
                continue;
            }
        };
        let action = parts.next().unwrap_or("").to_string();
        let payload = parts.next().and_then(|raw| serde_json::from_str(raw).ok()).unwrap_or(serde_json::json!({}));

        controller.handle_event(InboundEvent { source, action, payload });

        if let Some(outcome) = controller.last_result() {
            tracing::info!(?outcome, "last outcome");
        }
    }
}
