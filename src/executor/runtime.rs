use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::{Action, ActionList};
use crate::executor::actions::{Effect, MainContext};

/// The states of an [`ActionExecutor`].
#[derive(Debug, Copy, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorState {
    /// Waiting for the next action list.
    Idle,
    /// Walking an action list, possibly suspended on a pending continuation.
    Executing,
}

/// Errors returned by [`ActionExecutor::execute`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Executor is busy with another action list")]
    Busy,
}

/// Cursor over the actions of one `execute` call.
struct Run {
    id: u64,
    remaining: VecDeque<Action>,
    min_delay: Option<Duration>,
    token: CancellationToken,
}

struct Inner {
    worker: Handle,
    main: MainContext,
    state: watch::Sender<ExecutorState>,
    current: Mutex<Option<(u64, CancellationToken)>>,
    next_run: AtomicU64,
}

/// Plays back action lists with per-action and global timing.
///
/// Effects are posted to the [`MainContext`]; timed gaps are continuations
/// spawned on the worker runtime, so no thread sleeps while a list is suspended.
///
/// The executor is single-flight: while a list is executing, further calls to
/// [`execute`](Self::execute) are rejected with [`ExecutorError::Busy`].
#[derive(Clone)]
pub struct ActionExecutor {
    inner: Arc<Inner>,
}

impl ActionExecutor {
    /// Create an executor that schedules continuations on `worker` and
    /// delivers effects through `main`.
    pub fn new(worker: Handle, main: MainContext) -> Self {
        let (state, _) = watch::channel(ExecutorState::Idle);
        Self {
            inner: Arc::new(Inner {
                worker,
                main,
                state,
                current: Mutex::new(None),
                next_run: AtomicU64::new(1),
            }),
        }
    }

    /// Current state.
    pub fn state(&self) -> ExecutorState {
        *self.inner.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ExecutorState> {
        self.inner.state.subscribe()
    }

    /// Resolve once the executor is idle.
    pub async fn wait_idle(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|s| *s == ExecutorState::Idle).await;
    }

    /// Execute `actions` in order.
    ///
    /// Actions before the first suspension point are dispatched on the calling
    /// thread before this returns. A `Pause` suspends the walk for its duration;
    /// when `min_delay` is set, the walk suspends for that long after every
    /// dispatched action, so exactly one action runs per tick.
    ///
    /// An empty list is a no-op.
    pub fn execute(
        &self,
        actions: ActionList,
        min_delay: Option<Duration>,
    ) -> Result<(), ExecutorError> {
        let empty = actions.is_empty();
        let mut busy = false;
        // Held until the run is registered so `cancel` never sees EXECUTING without it.
        let mut current = self.inner.lock_current();
        self.inner.state.send_if_modified(|state| match *state {
            ExecutorState::Executing => {
                busy = true;
                false
            }
            ExecutorState::Idle if empty => false,
            ExecutorState::Idle => {
                *state = ExecutorState::Executing;
                true
            }
        });

        if busy {
            warn!(
                target: "autoclick::executor",
                actions = actions.len(),
                "Rejecting action list: executor is busy"
            );
            return Err(ExecutorError::Busy);
        }
        if empty {
            debug!(target: "autoclick::executor", "Empty action list; nothing to do");
            return Ok(());
        }

        let id = self.inner.next_run.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        *current = Some((id, token.clone()));
        drop(current);

        info!(
            target: "autoclick::executor",
            run = id,
            actions = actions.len(),
            min_delay_ms = min_delay.map(|d| d.as_millis() as u64),
            "Starting action list"
        );

        self.inner.tick(Run {
            id,
            remaining: actions.into(),
            min_delay,
            token,
        });
        Ok(())
    }

    /// Abort the running list, if any. Pending continuations are dropped and
    /// the executor becomes idle immediately.
    pub fn cancel(&self) {
        let mut current = self.inner.lock_current();
        if let Some((id, token)) = current.take() {
            token.cancel();
            self.inner.state.send_replace(ExecutorState::Idle);
            drop(current);
            info!(target: "autoclick::executor", run = id, "Action list cancelled");
        }
    }
}

impl Inner {
    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<(u64, CancellationToken)>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Dispatch actions until the list is exhausted or a suspension point is hit.
    fn tick(self: &Arc<Self>, mut run: Run) {
        while let Some(action) = run.remaining.pop_front() {
            if run.token.is_cancelled() {
                trace!(target: "autoclick::executor", run = run.id, "Run cancelled; stopping");
                return;
            }

            if let Action::Pause { duration_ms } = action {
                debug!(
                    target: "autoclick::executor",
                    run = run.id,
                    duration_ms,
                    remaining = run.remaining.len(),
                    "Pausing"
                );
                self.schedule(run, Duration::from_millis(duration_ms));
                return;
            }

            if let Some(effect) = Effect::from_action(&action) {
                trace!(target: "autoclick::executor", run = run.id, ?action, "Dispatching");
                self.main.post(effect);
            }

            if let Some(delay) = run.min_delay {
                debug!(
                    target: "autoclick::executor",
                    run = run.id,
                    delay_ms = delay.as_millis() as u64,
                    remaining = run.remaining.len(),
                    "Waiting minimum delay"
                );
                self.schedule(run, delay);
                return;
            }
        }

        self.finish(run.id);
    }

    /// Resume `run` on the worker after `delay`, unless it is cancelled first.
    fn schedule(self: &Arc<Self>, run: Run, delay: Duration) {
        let inner = Arc::clone(self);
        let token = run.token.clone();
        self.worker.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    trace!(target: "autoclick::executor", run = run.id, "Continuation cancelled");
                }
                _ = tokio::time::sleep(delay) => inner.tick(run),
            }
        });
    }

    /// Return to idle, provided `id` is still the current run.
    fn finish(&self, id: u64) {
        let mut current = self.lock_current();
        if matches!(*current, Some((cur, _)) if cur == id) {
            *current = None;
            self.state.send_replace(ExecutorState::Idle);
            info!(target: "autoclick::executor", run = id, "Action list completed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Button;
    use crate::executor::actions::{Gesture, GLOBAL_ACTION_BACK, Listeners};
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::Instant;

    fn executor() -> (ActionExecutor, UnboundedReceiver<Effect>) {
        let (main, rx) = MainContext::channel();
        (ActionExecutor::new(Handle::current(), main), rx)
    }

    fn click(x: i32, y: i32) -> Action {
        Action::Click {
            x,
            y,
            press_duration_ms: 100,
        }
    }

    fn drain(rx: &mut UnboundedReceiver<Effect>) -> Vec<Effect> {
        let mut out = Vec::new();
        while let Ok(e) = rx.try_recv() {
            out.push(e);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn dispatches_everything_in_order_without_delays() {
        let (ex, mut rx) = executor();
        ex.execute(
            vec![
                click(1, 1),
                Action::Input { text: "hi".into() },
                Action::ButtonPress {
                    button: Button::Back,
                },
                click(2, 2),
            ],
            None,
        )
        .unwrap();

        assert_eq!(ex.state(), ExecutorState::Idle);
        let effects = drain(&mut rx);
        assert_eq!(effects.len(), 4);
        assert_eq!(effects[0], Effect::Gesture(Gesture::tap(1, 1, 100)));
        assert!(matches!(effects[1], Effect::Action { .. }));
        assert_eq!(
            effects[2],
            Effect::GlobalAction {
                code: GLOBAL_ACTION_BACK
            }
        );
        assert_eq!(effects[3], Effect::Gesture(Gesture::tap(2, 2, 100)));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_list_is_noop() {
        let (ex, mut rx) = executor();
        ex.execute(vec![], None).unwrap();
        assert_eq!(ex.state(), ExecutorState::Idle);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn pause_suspends_then_resumes_remaining() {
        let (ex, mut rx) = executor();
        let start = Instant::now();
        ex.execute(
            vec![
                click(10, 10),
                Action::Pause { duration_ms: 200 },
                Action::Swipe {
                    from_x: 0,
                    from_y: 0,
                    to_x: 50,
                    to_y: 50,
                    duration_ms: 150,
                },
            ],
            None,
        )
        .unwrap();

        assert_eq!(drain(&mut rx), vec![Effect::Gesture(Gesture::tap(10, 10, 100))]);
        assert_eq!(ex.state(), ExecutorState::Executing);

        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(ex.state(), ExecutorState::Executing);
        assert!(drain(&mut rx).is_empty());

        ex.wait_idle().await;
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert_eq!(
            drain(&mut rx),
            vec![Effect::Gesture(Gesture::line((0, 0), (50, 50), 150))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn min_delay_dispatches_one_action_per_tick() {
        let (ex, mut rx) = executor();
        let start = Instant::now();
        ex.execute(
            vec![click(1, 1), click(2, 2), click(3, 3)],
            Some(Duration::from_millis(50)),
        )
        .unwrap();

        let mut at = Vec::new();
        for _ in 0..3 {
            rx.recv().await.unwrap();
            at.push(start.elapsed());
        }
        assert_eq!(at[0], Duration::ZERO);
        assert!(at[1] >= Duration::from_millis(50));
        assert!(at[2] >= at[1] + Duration::from_millis(50));
        assert_eq!(ex.state(), ExecutorState::Executing);

        ex.wait_idle().await;
        let total = start.elapsed();
        assert!(total >= Duration::from_millis(150));
        assert!(total < Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_is_not_followed_by_min_delay() {
        let (ex, mut rx) = executor();
        let start = Instant::now();
        ex.execute(
            vec![Action::Pause { duration_ms: 30 }, click(1, 1)],
            Some(Duration::from_millis(100)),
        )
        .unwrap();
        assert!(drain(&mut rx).is_empty());

        rx.recv().await.unwrap();
        let first = start.elapsed();
        assert!(first >= Duration::from_millis(30));
        assert!(first < Duration::from_millis(100));

        ex.wait_idle().await;
        assert!(start.elapsed() >= Duration::from_millis(130));
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_overlapping_execute() {
        let (ex, mut rx) = executor();
        ex.execute(vec![Action::Pause { duration_ms: 100 }, click(1, 1)], None)
            .unwrap();

        assert_eq!(ex.execute(vec![click(9, 9)], None), Err(ExecutorError::Busy));
        assert_eq!(ex.execute(vec![], None), Err(ExecutorError::Busy));
        assert_eq!(ex.state(), ExecutorState::Executing);

        ex.wait_idle().await;
        assert_eq!(drain(&mut rx), vec![Effect::Gesture(Gesture::tap(1, 1, 100))]);

        ex.execute(vec![click(9, 9)], None).unwrap();
        assert_eq!(drain(&mut rx), vec![Effect::Gesture(Gesture::tap(9, 9, 100))]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn executing_state_always_has_a_cancellable_run() {
        use std::sync::atomic::AtomicBool;

        let (ex, _rx) = executor();
        let stop = AtomicBool::new(false);
        let list = vec![click(1, 1), Action::Pause { duration_ms: 60_000 }, click(2, 2)];

        std::thread::scope(|s| {
            s.spawn(|| {
                while !stop.load(Ordering::Relaxed) {
                    let current = ex.inner.lock_current();
                    assert_eq!(ex.state() == ExecutorState::Executing, current.is_some());
                }
            });
            s.spawn(|| {
                while !stop.load(Ordering::Relaxed) {
                    ex.cancel();
                }
            });
            for _ in 0..2_000 {
                assert!(ex.execute(list.clone(), None).is_ok());
                ex.cancel();
                assert_eq!(ex.state(), ExecutorState::Idle);
            }
            stop.store(true, Ordering::Relaxed);
        });

        assert_eq!(ex.state(), ExecutorState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_continuation() {
        let (ex, mut rx) = executor();
        ex.execute(
            vec![click(1, 1), Action::Pause { duration_ms: 100 }, click(2, 2)],
            None,
        )
        .unwrap();
        assert_eq!(drain(&mut rx).len(), 1);

        ex.cancel();
        assert_eq!(ex.state(), ExecutorState::Idle);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(drain(&mut rx).is_empty());
        assert_eq!(ex.state(), ExecutorState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_continuation_does_not_end_new_run() {
        let (ex, mut rx) = executor();
        ex.execute(vec![Action::Pause { duration_ms: 50 }, click(1, 1)], None)
            .unwrap();
        ex.cancel();

        ex.execute(vec![Action::Pause { duration_ms: 200 }, click(2, 2)], None)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ex.state(), ExecutorState::Executing);
        assert!(drain(&mut rx).is_empty());

        ex.wait_idle().await;
        assert_eq!(drain(&mut rx), vec![Effect::Gesture(Gesture::tap(2, 2, 100))]);
    }

    #[tokio::test(start_paused = true)]
    async fn trailing_pause_keeps_executing_until_elapsed() {
        let (ex, _rx) = executor();
        let start = Instant::now();
        ex.execute(vec![click(1, 1), Action::Pause { duration_ms: 80 }], None)
            .unwrap();
        assert_eq!(ex.state(), ExecutorState::Executing);
        ex.wait_idle().await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test(start_paused = true)]
    async fn long_lists_do_not_recurse() {
        let (ex, mut rx) = executor();
        let actions: Vec<Action> = (0..20_000).map(|i| click(i, i)).collect();
        ex.execute(actions, None).unwrap();
        assert_eq!(drain(&mut rx).len(), 20_000);
        assert_eq!(ex.state(), ExecutorState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn listeners_receive_effects_on_primary_context() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listeners = Listeners {
            on_gesture: Some(Box::new(move |g: Gesture| {
                let p = g.strokes[0].path[0];
                sink.lock().unwrap().push((p.x as i32, p.y as i32));
            })),
            ..Default::default()
        };
        let (main, primary) = MainContext::spawn(listeners, &Handle::current());
        let ex = ActionExecutor::new(Handle::current(), main);

        ex.execute(
            vec![click(10, 10), Action::Pause { duration_ms: 200 }, click(20, 20)],
            None,
        )
        .unwrap();
        ex.wait_idle().await;
        drop(ex);
        primary.await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(10, 10), (20, 20)]);
    }
}
