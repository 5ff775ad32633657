// Run session: the single event loop that owns the maze, the robot display
// and the playback state machine, and publishes what the view should show.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::animation::{AnimationState, AnimationStateMachine, Step};
use crate::engine::maze::MazeConfiguration;
use crate::engine::robot::{apply_command, Command, RobotState};
use crate::engine::telemetry::TelemetryFrame;
use crate::error::Result;
use crate::metrics;
use crate::run_service::RunService;
use crate::scheduler::{schedule, TimerHandle};
use crate::submission::{apply_outcome, RunOutcome, SubmissionCoordinator, SubmissionTarget};

/// Frames kept for slow subscribers before they start lagging.
const FRAME_CHANNEL_CAPACITY: usize = 256;

/// Everything the session reacts to, handled strictly in arrival order.
#[derive(Debug)]
pub enum SessionEvent {
    /// Manual driving (only while idle or finished).
    Command(Command),
    /// Submit `code` against the current maze, or the tournament if one is set.
    Run { code: String },
    /// Stop playback. Ignored unless PLAYING.
    Cancel,
    /// Put the robot back at the start. Ignored while LOADING or PLAYING.
    Reset,
    SetDelay(Duration),
    SetSpeed(u64),
    /// Replace the maze and reset the robot. Ignored while LOADING or PLAYING.
    LoadMaze(Arc<MazeConfiguration>),
    /// Route subsequent runs to a tournament (`Some`) or back to practice.
    SetTournament(Option<i64>),
    /// A frame timer fired for the given playback generation.
    FrameDue { generation: u64 },
    /// The run service answered (or failed to).
    SubmissionDone(Result<RunOutcome>),
    Shutdown,
}

/// Cheap, cloneable front end to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
    robot: watch::Receiver<RobotState>,
    state: watch::Receiver<AnimationState>,
    settled: watch::Receiver<u64>,
    frames: broadcast::Sender<TelemetryFrame>,
}

impl SessionHandle {
    /// Queue an event. Returns false once the session has stopped.
    pub fn send(&self, event: SessionEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn command(&self, command: Command) -> bool {
        self.send(SessionEvent::Command(command))
    }

    pub fn run(&self, code: impl Into<String>) -> bool {
        self.send(SessionEvent::Run { code: code.into() })
    }

    pub fn cancel(&self) -> bool {
        self.send(SessionEvent::Cancel)
    }

    pub fn reset(&self) -> bool {
        self.send(SessionEvent::Reset)
    }

    pub fn set_speed(&self, speed: u64) -> bool {
        self.send(SessionEvent::SetSpeed(speed))
    }

    pub fn shutdown(&self) -> bool {
        self.send(SessionEvent::Shutdown)
    }

    /// The robot as currently displayed.
    pub fn robot(&self) -> RobotState {
        *self.robot.borrow()
    }

    pub fn state(&self) -> AnimationState {
        *self.state.borrow()
    }

    pub fn watch_robot(&self) -> watch::Receiver<RobotState> {
        self.robot.clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<AnimationState> {
        self.state.clone()
    }

    /// Every telemetry frame delivered from now on.
    pub fn subscribe_frames(&self) -> broadcast::Receiver<TelemetryFrame> {
        self.frames.subscribe()
    }

    /// Wait until the animation state satisfies `pred`. Returns `None` if the
    /// session stops first.
    pub async fn wait_for_state(
        &self,
        mut pred: impl FnMut(AnimationState) -> bool,
    ) -> Option<AnimationState> {
        let mut rx = self.state.clone();
        let result = rx.wait_for(|s| pred(*s)).await;
        result.ok().map(|s| *s)
    }

    /// Wait until the session has applied at least `count` submission results
    /// to the state machine. Returns the running total, or `None` if the
    /// session stops first.
    pub async fn wait_for_submissions(&self, count: u64) -> Option<u64> {
        let mut rx = self.settled.clone();
        let result = rx.wait_for(|n| *n >= count).await;
        result.ok().map(|n| *n)
    }
}

pub struct RunSession<S> {
    maze: Arc<MazeConfiguration>,
    tournament: Option<i64>,
    machine: AnimationStateMachine,
    coordinator: Arc<SubmissionCoordinator<S>>,
    robot: Arc<watch::Sender<RobotState>>,
    state: watch::Sender<AnimationState>,
    settled: watch::Sender<u64>,
    // Weak so the loop ends once every handle is gone
    tx: mpsc::WeakUnboundedSender<SessionEvent>,
    rx: mpsc::UnboundedReceiver<SessionEvent>,
    timer: Option<TimerHandle>,
}

impl<S: RunService> RunSession<S> {
    pub fn new(
        maze: Arc<MazeConfiguration>,
        coordinator: SubmissionCoordinator<S>,
        delay: Duration,
    ) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (robot_tx, robot_rx) = watch::channel(RobotState::initial());
        let (state_tx, state_rx) = watch::channel(AnimationState::None);
        let (settled_tx, settled_rx) = watch::channel(0u64);
        let (frames_tx, _) = broadcast::channel(FRAME_CHANNEL_CAPACITY);

        let robot = Arc::new(robot_tx);
        let sink_robot = robot.clone();
        let sink_frames = frames_tx.clone();
        let machine = AnimationStateMachine::with_delay(delay, move |frame: &TelemetryFrame| {
            sink_robot.send_modify(|r| r.apply_frame(frame));
            // Nobody listening to raw frames is fine; the robot watch has it
            let _ = sink_frames.send(*frame);
        });

        let session = Self {
            maze,
            tournament: None,
            machine,
            coordinator: Arc::new(coordinator),
            robot,
            state: state_tx,
            settled: settled_tx,
            tx: tx.downgrade(),
            rx,
            timer: None,
        };
        let handle = SessionHandle {
            tx,
            robot: robot_rx,
            state: state_rx,
            settled: settled_rx,
            frames: frames_tx,
        };
        (session, handle)
    }

    /// Start the session on the runtime.
    pub fn spawn(
        maze: Arc<MazeConfiguration>,
        coordinator: SubmissionCoordinator<S>,
        delay: Duration,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (session, handle) = Self::new(maze, coordinator, delay);
        (handle, tokio::spawn(session.run()))
    }

    /// Process events until `Shutdown` or until every handle is dropped.
    pub async fn run(mut self) {
        tracing::info!(maze = self.maze.id, "session started");
        while let Some(event) = self.rx.recv().await {
            if !self.handle(event) {
                break;
            }
            self.publish_state();
        }
        if let Some(mut timer) = self.timer.take() {
            timer.cancel();
        }
        tracing::info!("session stopped");
    }

    fn handle(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Command(command) => self.drive(command),
            SessionEvent::Run { code } => self.start_run(code),
            SessionEvent::Cancel => {
                if self.machine.cancel() {
                    if let Some(mut timer) = self.timer.take() {
                        timer.cancel();
                    }
                } else {
                    tracing::debug!(state = %self.machine.state(), "cancel ignored");
                }
            }
            SessionEvent::Reset => {
                if self.machine.reset().is_none() {
                    tracing::debug!(state = %self.machine.state(), "reset ignored");
                }
            }
            SessionEvent::SetDelay(delay) => self.machine.set_delay(delay),
            SessionEvent::SetSpeed(speed) => self.machine.set_speed(speed),
            SessionEvent::LoadMaze(maze) => {
                if self.machine.reset().is_some() {
                    tracing::info!(maze = maze.id, rows = maze.rows(), cols = maze.cols(), "maze loaded");
                    self.maze = maze;
                } else {
                    tracing::debug!(state = %self.machine.state(), "maze change ignored");
                }
            }
            SessionEvent::SetTournament(tournament) => self.tournament = tournament,
            SessionEvent::FrameDue { generation } => self.advance(generation),
            SessionEvent::SubmissionDone(result) => {
                if apply_outcome(&mut self.machine, result) == AnimationState::Playing {
                    // First frame goes out right away, the rest on the timer
                    self.advance(self.machine.generation());
                }
                // State first, so a waiter woken by the count sees where the run landed
                self.publish_state();
                self.settled.send_modify(|n| *n += 1);
            }
            SessionEvent::Shutdown => return false,
        }
        true
    }

    fn drive(&mut self, command: Command) {
        match self.machine.state() {
            AnimationState::None | AnimationState::Finished => {}
            state => {
                tracing::debug!(%state, ?command, "manual command ignored during a run");
                return;
            }
        }
        let current = *self.robot.borrow();
        let next = apply_command(current, &self.maze, command);
        metrics::MANUAL_COMMANDS_TOTAL
            .with_label_values(&[command.name()])
            .inc();
        if next != current {
            self.robot.send_replace(next);
        }
    }

    fn start_run(&mut self, code: String) {
        let request = self.machine.begin_run();
        if !request.should_submit() {
            tracing::debug!(?request, "run request ignored");
            return;
        }
        let Some(tx) = self.tx.upgrade() else {
            return;
        };

        let target = match self.tournament {
            Some(tournament_id) => SubmissionTarget::Tournament { tournament_id },
            None => SubmissionTarget::Practice {
                maze_id: self.maze.id,
            },
        };
        let coordinator = self.coordinator.clone();
        tokio::spawn(async move {
            let result = coordinator.submit(&code, target).await;
            // The session may have shut down while the request was in flight
            let _ = tx.send(SessionEvent::SubmissionDone(result));
        });
    }

    fn advance(&mut self, generation: u64) {
        match self.machine.step(generation) {
            Step::Frame => {
                let Some(tx) = self.tx.upgrade() else {
                    return;
                };
                self.timer = Some(schedule(
                    &tx,
                    self.machine.delay(),
                    SessionEvent::FrameDue { generation },
                ));
            }
            Step::Finished => self.timer = None,
            Step::Stale => tracing::debug!(generation, "stale frame tick dropped"),
        }
    }

    fn publish_state(&self) {
        let current = self.machine.state();
        self.state.send_if_modified(|s| {
            if *s == current {
                return false;
            }
            *s = current;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::maze::CellPos;
    use crate::engine::robot::Direction;
    use crate::report::NoticeBoard;
    use crate::run_service::{RunRequest, RunResponse};

    struct NeverCalled;

    impl RunService for NeverCalled {
        async fn run(&self, _request: RunRequest) -> Result<RunResponse> {
            Ok(RunResponse::failed("unexpected submission"))
        }
    }

    fn corridor() -> Arc<MazeConfiguration> {
        // Open east-west corridor along the top row
        let grid = vec![vec![0xB, 0xA, 0xA, 0xE]];
        Arc::new(
            MazeConfiguration::new(1, CellPos { row: 0, col: 0 }, CellPos { row: 0, col: 3 }, grid)
                .unwrap(),
        )
    }

    fn spawn_idle() -> (SessionHandle, JoinHandle<()>) {
        let coordinator = SubmissionCoordinator::new(NeverCalled, Arc::new(NoticeBoard::new()));
        RunSession::spawn(corridor(), coordinator, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_manual_driving_respects_walls() {
        let (handle, task) = spawn_idle();
        let mut robot = handle.watch_robot();

        // Facing up into the outer wall: blocked, nothing published
        handle.command(Command::Forward);
        handle.command(Command::RotateRight);
        handle.command(Command::Forward);
        handle.command(Command::Forward);
        handle.shutdown();
        task.await.unwrap();

        let state = *robot.borrow_and_update();
        assert_eq!(
            state,
            RobotState {
                x: 2,
                y: 0,
                direction: Direction::Right,
            }
        );
    }

    #[tokio::test]
    async fn test_load_maze_resets_robot() {
        let (handle, task) = spawn_idle();
        handle.command(Command::RotateRight);
        handle.command(Command::Forward);
        handle.send(SessionEvent::LoadMaze(corridor()));
        handle.shutdown();
        task.await.unwrap();

        assert_eq!(handle.robot(), RobotState::initial());
    }

    #[tokio::test]
    async fn test_cancel_and_reset_when_idle() {
        let (handle, task) = spawn_idle();
        handle.cancel();
        handle.reset();
        handle.shutdown();
        task.await.unwrap();

        assert_eq!(handle.state(), AnimationState::None);
        assert_eq!(handle.robot(), RobotState::initial());
    }

    #[tokio::test]
    async fn test_session_stops_when_handles_drop() {
        let (handle, task) = spawn_idle();
        drop(handle);
        task.await.unwrap();
    }
}
