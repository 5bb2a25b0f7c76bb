use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::bitmap::BitmapCache;
use crate::config::{Config, Scenario};
use crate::executor::ActionExecutor;
use crate::sources::Trigger;

/// Runner is responsible for:
/// - resolving a scenario's condition bitmaps through the cache
/// - handing the scenario's actions to the `ActionExecutor`
pub struct Runner {
    config: Config,
    cache: Arc<BitmapCache>,
    executor: ActionExecutor,
}

impl Runner {
    pub fn new(config: Config, cache: Arc<BitmapCache>, executor: ActionExecutor) -> Self {
        Self {
            config,
            cache,
            executor,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &BitmapCache {
        &self.cache
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    /// Load every condition bitmap of every scenario into the cache.
    /// Returns how many were resolved; missing files are only logged.
    pub async fn preload(&self) -> Result<usize> {
        let mut loaded = 0;
        for (name, scenario) in &self.config.scenarios {
            for cond in &scenario.conditions {
                let hit = self
                    .cache
                    .load_from_storage(&cond.path, &cond.path, cond.width, cond.height)
                    .await
                    .with_context(|| format!("Scenario '{name}': loading condition '{}'", cond.key))?;
                if hit.is_some() {
                    loaded += 1;
                }
            }
        }
        info!(target: "autoclick::runner", loaded, stats = ?self.cache.stats(), "Conditions preloaded");
        Ok(loaded)
    }

    /// Handle a raw trigger event (`{"scenario": "..."}`).
    pub async fn run_event(&self, event: &Value) -> Result<bool> {
        let trigger = Trigger::from_event(event)?;
        self.run_scenario(&trigger.scenario).await
    }

    /// Run the named scenario.
    ///
    /// Returns `Ok(false)` without executing anything when one of its condition
    /// bitmaps cannot be resolved: the scenario is treated as unmatched.
    pub async fn run_scenario(&self, name: &str) -> Result<bool> {
        let scenario = self
            .config
            .scenarios
            .get(name)
            .ok_or_else(|| anyhow!("Unknown scenario '{}'", name))?;

        if !self.conditions_resolved(name, scenario).await? {
            return Ok(false);
        }

        let min_delay = scenario
            .min_delay_ms
            .or(self.config.executor.min_delay_ms)
            .map(Duration::from_millis);

        debug!(
            target: "autoclick::runner",
            scenario = %name,
            actions = scenario.actions.len(),
            "Triggering scenario"
        );
        self.executor
            .execute(scenario.actions.clone(), min_delay)
            .with_context(|| format!("Scenario '{name}' could not start"))?;
        Ok(true)
    }

    async fn conditions_resolved(&self, name: &str, scenario: &Scenario) -> Result<bool> {
        for cond in &scenario.conditions {
            let image = self
                .cache
                .load_from_storage(&cond.path, &cond.path, cond.width, cond.height)
                .await
                .with_context(|| format!("Scenario '{name}': loading condition '{}'", cond.key))?;
            if image.is_none() {
                warn!(
                    target: "autoclick::runner",
                    scenario = %name,
                    condition = %cond.key,
                    path = %cond.path,
                    "Condition bitmap unavailable; treating scenario as unmatched"
                );
                return Ok(false);
            }
        }
        Ok(true)
    }
}
