use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration for Autoclick.
///
/// Deserialized from a JSON file. It captures what the runtime needs:
/// - `executor` timing settings shared by every scenario
/// - `cache` budget and the directory holding persisted condition bitmaps
/// - `scenarios`: named action lists with the condition images they depend on
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct Config {
    /// Action executor settings.
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Bitmap cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Named scenarios. Triggers refer to a scenario by name.
    #[serde(default)]
    pub scenarios: Scenarios,
}

/// Named scenarios map.
pub type Scenarios = BTreeMap<String, Scenario>;

/// Ordered list of actions. Order is execution order; empty means no-op.
pub type ActionList = Vec<Action>;

/// Global executor settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct ExecutorConfig {
    /// Floor delay in milliseconds inserted after every dispatched action.
    /// When set, exactly one action is dispatched per scheduled tick.
    #[serde(default)]
    pub min_delay_ms: Option<u64>,
}

/// Bitmap cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct CacheConfig {
    /// Maximum aggregate size of cached bitmaps in kilobytes.
    /// Defaults to half of the available system memory.
    #[serde(default)]
    pub budget_kb: Option<u64>,

    /// Directory holding raw condition bitmaps (`Condition_*` files).
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
}

/// A scenario: the condition images it matches against and the actions it plays.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct Scenario {
    /// Reference images resolved through the bitmap cache.
    #[serde(default)]
    pub conditions: Vec<ConditionRef>,

    /// Overrides `executor.min_delay_ms` for this scenario.
    #[serde(default)]
    pub min_delay_ms: Option<u64>,

    /// Actions executed when the scenario is triggered.
    #[serde(default)]
    pub actions: ActionList,
}

/// Reference to a persisted condition bitmap.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ConditionRef {
    /// Name of the condition within its scenario, used in logs.
    pub key: String,
    /// File name relative to `cache.storage_dir`. The bitmap is cached under it.
    pub path: String,
    pub width: u32,
    pub height: u32,
}

/// A single synthetic input step.
///
/// Every field is mandatory: an action that reaches the executor is always complete.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Press a single point for `press_duration_ms`.
    Click { x: i32, y: i32, press_duration_ms: u64 },

    /// Drag from one point to another over `duration_ms`.
    Swipe {
        from_x: i32,
        from_y: i32,
        to_x: i32,
        to_y: i32,
        duration_ms: u64,
    },

    /// Set the literal text on the focused input.
    Input { text: String },

    /// Press a system button.
    ButtonPress { button: Button },

    /// Suspend the sequence for `duration_ms` before the remaining actions run.
    Pause { duration_ms: u64 },
}

/// System buttons.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    Home,
    Recent,
    Back,
}
