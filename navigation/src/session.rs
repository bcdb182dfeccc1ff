use std::{future, sync::Arc};

use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    task::JoinHandle,
};

use crate::{
    config::NavigationConfig,
    location::{LocationSource, PositionSubscription},
    models::{Coordinate, NavigationState, PositionFix, Route},
    tracker::{NavigationError, NavigationTracker},
};

const COMMAND_CAPACITY: usize = 16;
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("navigation session is no longer running")]
    Closed,
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error("navigation session task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started { total_steps: usize },
    StepAdvanced { index: usize, total_steps: usize },
    Arrived,
    Stopped,
    /// The location source finished; the route stays loaded.
    LocationEnded,
}

enum Command {
    Start {
        route: Route,
        origin: Coordinate,
        reply: oneshot::Sender<Result<NavigationState, NavigationError>>,
    },
    Stop,
    ChangeDestination,
    Shutdown,
}

/// Handle to a running session. Dropping it shuts the session down.
#[derive(Debug)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<NavigationState>,
    events: broadcast::Sender<SessionEvent>,
    task: JoinHandle<Vec<PositionFix>>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Start { route, origin, .. } => f
                .debug_struct("Start")
                .field("steps", &route.steps.len())
                .field("origin", origin)
                .finish(),
            Command::Stop => f.write_str("Stop"),
            Command::ChangeDestination => f.write_str("ChangeDestination"),
            Command::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Spawn a session task on the current tokio runtime.
///
/// The task owns the [`NavigationTracker`] and applies commands and fixes
/// strictly one at a time, so the step index never regresses. The latest
/// state goes out on a watch channel, transitions as [`SessionEvent`]s.
pub fn spawn<L>(config: NavigationConfig, location: Arc<L>) -> SessionHandle
where
    L: LocationSource + 'static,
{
    let (commands, command_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (state_tx, state) = watch::channel(NavigationState::idle());
    let (events, _) = broadcast::channel(EVENT_CAPACITY);

    let worker = SessionWorker {
        tracker: NavigationTracker::new(config),
        location,
        state: state_tx,
        events: events.clone(),
        updates: None,
        trail: Vec::new(),
        arrived: false,
    };
    let task = tokio::spawn(worker.run(command_rx));

    SessionHandle {
        commands,
        state,
        events,
        task,
    }
}

impl SessionHandle {
    /// Load `route` and begin following fixes from the location source.
    pub async fn start(
        &self,
        route: Route,
        origin: Coordinate,
    ) -> Result<NavigationState, SessionError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Start {
            route,
            origin,
            reply,
        })
        .await?;
        let state = response.await.map_err(|_| SessionError::Closed)??;
        Ok(state)
    }

    pub async fn stop(&self) -> Result<(), SessionError> {
        self.send(Command::Stop).await
    }

    pub async fn change_destination(&self) -> Result<(), SessionError> {
        self.send(Command::ChangeDestination).await
    }

    /// Watch the latest state; the UI renders from this.
    pub fn watch(&self) -> watch::Receiver<NavigationState> {
        self.state.clone()
    }

    pub fn current_state(&self) -> NavigationState {
        self.state.borrow().clone()
    }

    /// Events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Stop the task and return the breadcrumb trail of the last route.
    pub async fn shutdown(self) -> Result<Vec<PositionFix>, SessionError> {
        // The task may already be gone; the join below reports how it ended.
        let _ = self.commands.send(Command::Shutdown).await;
        Ok(self.task.await?)
    }

    async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }
}

struct SessionWorker<L> {
    tracker: NavigationTracker,
    location: Arc<L>,
    state: watch::Sender<NavigationState>,
    events: broadcast::Sender<SessionEvent>,
    updates: Option<PositionSubscription>,
    trail: Vec<PositionFix>,
    arrived: bool,
}

impl<L: LocationSource + 'static> SessionWorker<L> {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> Vec<PositionFix> {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                fix = next_fix(&mut self.updates) => match fix {
                    Some(fix) => self.handle_fix(fix),
                    None => {
                        tracing::warn!("location updates ended");
                        self.updates = None;
                        self.emit(SessionEvent::LocationEnded);
                    }
                },
            }
        }

        tracing::info!("navigation session shut down");
        self.trail
    }

    fn handle_command(&mut self, command: Command) {
        tracing::debug!("session command {:?}", command);
        match command {
            Command::Start {
                route,
                origin,
                reply,
            } => {
                let result = self.tracker.start_navigation(route, origin);
                if let Ok(state) = &result {
                    self.trail.clear();
                    if origin.is_valid() {
                        self.trail.push(origin.into());
                    }
                    self.arrived = false;
                    self.updates = Some(self.location.position_updates());
                    self.publish(state.clone());
                    self.emit(SessionEvent::Started {
                        total_steps: state.total_steps,
                    });
                }
                if reply.send(result).is_err() {
                    tracing::debug!("start requester went away");
                }
            }
            Command::Stop => {
                let state = self.tracker.stop_navigation();
                self.end_route(state);
            }
            Command::ChangeDestination => {
                let state = self.tracker.change_destination();
                self.end_route(state);
            }
            Command::Shutdown => {}
        }
    }

    fn handle_fix(&mut self, fix: PositionFix) {
        let accepted = self.tracker.accepts(&fix);
        let before = self.tracker.state().current_step_index;
        let state = self.tracker.on_position_update(fix);
        if !accepted {
            return;
        }
        self.trail.push(fix);

        if state.current_step_index != before {
            self.emit(SessionEvent::StepAdvanced {
                index: state.current_step_index,
                total_steps: state.total_steps,
            });
        }

        let arrival = self.tracker.is_arrival(&state);
        self.publish(state);

        if arrival && !self.arrived {
            self.arrived = true;
            tracing::info!("arrived at destination");
            self.emit(SessionEvent::Arrived);
            if self.tracker.config().stop_on_arrival {
                let state = self.tracker.stop_navigation();
                self.end_route(state);
            }
        }
    }

    fn end_route(&mut self, state: NavigationState) {
        self.updates = None;
        self.publish(state);
        self.emit(SessionEvent::Stopped);
    }

    fn publish(&self, state: NavigationState) {
        self.state.send_replace(state);
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

async fn next_fix(updates: &mut Option<PositionSubscription>) -> Option<PositionFix> {
    match updates {
        Some(subscription) => subscription.next().await,
        None => future::pending().await,
    }
}
