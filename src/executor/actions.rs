use serde::Serialize;
use std::collections::BTreeMap;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{error, trace, warn};

use crate::config::{Action, Button};

/// System action code: navigate back.
pub const GLOBAL_ACTION_BACK: i32 = 1;
/// System action code: go to the home screen.
pub const GLOBAL_ACTION_HOME: i32 = 2;
/// System action code: show recent apps.
pub const GLOBAL_ACTION_RECENTS: i32 = 3;

/// Action code carried by text input effects.
pub const ACTION_SET_TEXT: i32 = 0x0020_0000;
/// Argument key holding the literal text of an `ACTION_SET_TEXT` effect.
pub const ACTION_ARGUMENT_SET_TEXT_CHARSEQUENCE: &str = "ACTION_ARGUMENT_SET_TEXT_CHARSEQUENCE";

/// A point on the target surface, in pixels.
#[derive(Debug, Copy, Clone, Serialize, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// One continuous touch along `path`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Stroke {
    pub path: Vec<Point>,
    pub start_time_ms: u64,
    pub duration_ms: u64,
}

/// A described touch gesture, interpreted by an external injector.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Gesture {
    pub strokes: Vec<Stroke>,
}

impl Gesture {
    /// Single-point press.
    pub fn tap(x: i32, y: i32, duration_ms: u64) -> Self {
        Self {
            strokes: vec![Stroke {
                path: vec![point(x, y)],
                start_time_ms: 0,
                duration_ms,
            }],
        }
    }

    /// Straight line from `from` to `to`.
    pub fn line(from: (i32, i32), to: (i32, i32), duration_ms: u64) -> Self {
        Self {
            strokes: vec![Stroke {
                path: vec![point(from.0, from.1), point(to.0, to.1)],
                start_time_ms: 0,
                duration_ms,
            }],
        }
    }
}

fn point(x: i32, y: i32) -> Point {
    Point {
        x: x as f32,
        y: y as f32,
    }
}

/// A side effect delivered on the primary context.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    Gesture(Gesture),
    Action {
        action_id: i32,
        arguments: BTreeMap<String, String>,
    },
    GlobalAction { code: i32 },
}

impl Effect {
    /// Build the effect for `action`. Pauses have none.
    pub fn from_action(action: &Action) -> Option<Self> {
        match action {
            Action::Click {
                x,
                y,
                press_duration_ms,
            } => Some(Effect::Gesture(Gesture::tap(*x, *y, *press_duration_ms))),
            Action::Swipe {
                from_x,
                from_y,
                to_x,
                to_y,
                duration_ms,
            } => Some(Effect::Gesture(Gesture::line(
                (*from_x, *from_y),
                (*to_x, *to_y),
                *duration_ms,
            ))),
            Action::Input { text } => Some(Effect::Action {
                action_id: ACTION_SET_TEXT,
                arguments: BTreeMap::from([(
                    ACTION_ARGUMENT_SET_TEXT_CHARSEQUENCE.to_string(),
                    text.clone(),
                )]),
            }),
            Action::ButtonPress { button } => Some(Effect::GlobalAction {
                code: global_action_code(*button),
            }),
            Action::Pause { .. } => None,
        }
    }
}

/// Map a system button to its platform action code.
pub fn global_action_code(button: Button) -> i32 {
    match button {
        Button::Home => GLOBAL_ACTION_HOME,
        Button::Recent => GLOBAL_ACTION_RECENTS,
        Button::Back => GLOBAL_ACTION_BACK,
    }
}

pub type GestureListener = Box<dyn Fn(Gesture) + Send + Sync>;
pub type ActionListener = Box<dyn Fn(i32, BTreeMap<String, String>) + Send + Sync>;
pub type ButtonListener = Box<dyn Fn(i32) + Send + Sync>;

/// Optional output callbacks. An unset listener silently drops its effects.
#[derive(Default)]
pub struct Listeners {
    pub on_gesture: Option<GestureListener>,
    pub on_action: Option<ActionListener>,
    pub on_button: Option<ButtonListener>,
}

impl Listeners {
    /// Invoke the listener matching `effect`, if any.
    pub fn deliver(&self, effect: Effect) {
        match effect {
            Effect::Gesture(gesture) => {
                if let Some(cb) = &self.on_gesture {
                    cb(gesture);
                }
            }
            Effect::Action {
                action_id,
                arguments,
            } => {
                if let Some(cb) = &self.on_action {
                    cb(action_id, arguments);
                }
            }
            Effect::GlobalAction { code } => {
                if let Some(cb) = &self.on_button {
                    cb(code);
                }
            }
        }
    }
}

/// Handle to the primary context, the only place effects are delivered.
///
/// Posting never blocks: effects are queued and the owner of the receiving end
/// hands them to the listeners in order.
#[derive(Debug, Clone)]
pub struct MainContext {
    tx: UnboundedSender<Effect>,
}

impl MainContext {
    /// Create a context whose effects are read from the returned receiver.
    pub fn channel() -> (Self, UnboundedReceiver<Effect>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Spawn a task on `handle` that delivers every posted effect to `listeners`.
    /// The task ends once every `MainContext` clone is dropped.
    pub fn spawn(listeners: Listeners, handle: &Handle) -> (Self, JoinHandle<()>) {
        let (ctx, mut rx) = Self::channel();
        let task = handle.spawn(async move {
            while let Some(effect) = rx.recv().await {
                trace!(target: "autoclick::main", ?effect, "Delivering effect");
                listeners.deliver(effect);
            }
            trace!(target: "autoclick::main", "Primary context closed");
        });
        (ctx, task)
    }

    /// Queue `effect` for delivery.
    pub fn post(&self, effect: Effect) {
        if self.tx.send(effect).is_err() {
            warn!(target: "autoclick::main", "Primary context is gone; effect dropped");
        }
    }
}

/// Wait for the delivery task returned by [`MainContext::spawn`].
///
/// Returns `false` and logs the failure if a listener panicked or the task was aborted.
pub async fn join_primary(task: JoinHandle<()>) -> bool {
    match task.await {
        Ok(()) => true,
        Err(e) => {
            error!(
                target: "autoclick::main",
                error = %e,
                panicked = e.is_panic(),
                "Primary context task failed"
            );
            false
        }
    }
}
