// The active-playback gauge must fall back when a session goes away mid-run.
// Kept in its own test binary: the gauge is process-wide.

use std::sync::Arc;
use std::time::Duration;

use robomaze::engine::maze::{CellPos, MazeConfiguration};
use robomaze::engine::telemetry::TelemetryFrame;
use robomaze::error::Result;
use robomaze::metrics::ACTIVE_PLAYBACKS;
use robomaze::report::NoticeBoard;
use robomaze::run_service::{RunRequest, RunResponse, RunService};
use robomaze::session::{RunSession, SessionHandle};
use robomaze::submission::SubmissionCoordinator;

struct FourFrames;

impl RunService for FourFrames {
    async fn run(&self, _request: RunRequest) -> Result<RunResponse> {
        Ok(RunResponse {
            status: "ok".into(),
            telemetry: Some((0..4).map(|x| TelemetryFrame::at(x, 0)).collect()),
            did_win: Some(true),
            total_time: Some(3),
            ..RunResponse::default()
        })
    }
}

fn spawn_slow_session() -> (SessionHandle, tokio::task::JoinHandle<()>) {
    let maze = MazeConfiguration::new(
        1,
        CellPos { row: 0, col: 0 },
        CellPos { row: 0, col: 3 },
        vec![vec![0xB, 0xA, 0xA, 0xE]],
    )
    .unwrap();
    let coordinator = SubmissionCoordinator::new(FourFrames, Arc::new(NoticeBoard::new()));
    RunSession::spawn(Arc::new(maze), coordinator, Duration::from_millis(1000))
}

#[tokio::test(start_paused = true)]
async fn test_gauge_released_when_session_ends_mid_playback() {
    assert_eq!(ACTIVE_PLAYBACKS.get(), 0);

    // Explicit shutdown while PLAYING
    let (handle, task) = spawn_slow_session();
    let mut frames = handle.subscribe_frames();
    handle.run("code");
    frames.recv().await.unwrap();
    assert_eq!(ACTIVE_PLAYBACKS.get(), 1);

    handle.shutdown();
    task.await.unwrap();
    assert_eq!(ACTIVE_PLAYBACKS.get(), 0);

    // Every handle dropped while PLAYING
    let (handle, task) = spawn_slow_session();
    let mut frames = handle.subscribe_frames();
    handle.run("code");
    frames.recv().await.unwrap();
    assert_eq!(ACTIVE_PLAYBACKS.get(), 1);

    drop(handle);
    task.await.unwrap();
    assert_eq!(ACTIVE_PLAYBACKS.get(), 0);
}
