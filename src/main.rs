use std::path::Path;
use std::sync::Arc;

use tokio::io::AsyncBufReadExt;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use robomaze::animation::AnimationState;
use robomaze::config::Config;
use robomaze::engine::generator::{generate_maze, random_maze};
use robomaze::engine::maze::MazeConfiguration;
use robomaze::engine::robot::{Command, RobotState};
use robomaze::error::{Error, Result};
use robomaze::metrics;
use robomaze::report::NoticeBoard;
use robomaze::run_service::{HttpRunService, LogRunService, RunService};
use robomaze::session::{RunSession, SessionEvent, SessionHandle};
use robomaze::submission::SubmissionCoordinator;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    metrics::register_metrics();

    if let Err(e) = run().await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = Config::load()?;
    let maze = Arc::new(load_maze(&config)?);
    tracing::info!(
        maze = maze.id,
        rows = maze.rows(),
        cols = maze.cols(),
        "maze ready"
    );
    for row in maze.hex_grid() {
        println!("{}", row.join(" "));
    }

    match &config.log_file {
        Some(path) => {
            tracing::info!("offline mode: replaying {}", path.display());
            let service = LogRunService::new(read_file(path)?);
            run_with(service, &config, maze).await
        }
        None => {
            let service = HttpRunService::new(config.run_url.clone(), config.run_token.clone());
            run_with(service, &config, maze).await
        }
    }
}

fn load_maze(config: &Config) -> Result<MazeConfiguration> {
    if let Some(path) = &config.maze_file {
        return MazeConfiguration::from_json(&read_file(path)?);
    }
    let mut rng = rand::thread_rng();
    match config.maze_size {
        Some(size) => generate_maze(0, size, size, &mut rng),
        None => random_maze(0, &mut rng),
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))
}

async fn run_with<S: RunService>(
    service: S,
    config: &Config,
    maze: Arc<MazeConfiguration>,
) -> Result<()> {
    let board = Arc::new(NoticeBoard::new());
    let mut notices = board.subscribe();
    let coordinator = SubmissionCoordinator::new(service, board).with_timeout(config.run_timeout);

    let (handle, task) = RunSession::spawn(maze, coordinator, config.frame_delay);
    handle.send(SessionEvent::SetTournament(config.tournament_id));
    let view = tokio::spawn(print_robot(handle.watch_robot()));

    if config.drive {
        drive(&handle).await;
    } else {
        let code = match &config.code_file {
            Some(path) => read_file(path)?,
            None => String::new(),
        };
        handle.run(code);

        // Exactly one notice arrives per attempt
        match notices.recv().await {
            Ok(notice) => println!("{}", notice.message),
            Err(e) => tracing::warn!("outcome notice lost: {e}"),
        }
        // The notice can beat the session; wait until the result is applied
        handle.wait_for_submissions(1).await;
        handle
            .wait_for_state(|s| !matches!(s, AnimationState::Loading | AnimationState::Playing))
            .await;
    }

    handle.shutdown();
    if let Err(e) = task.await {
        tracing::error!("session task failed: {e}");
    }
    view.abort();
    tracing::debug!("final metrics:\n{}", metrics::gather_metrics());
    Ok(())
}

/// Manual driving: one key per token (`w`/`a`/`s`/`d` or arrow key names),
/// `reset` to return to the start, `quit` to stop.
async fn drive(handle: &SessionHandle) {
    println!("drive with w/a/s/d, 'reset' to restart, 'quit' to stop");
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("stdin closed: {e}");
                break;
            }
        };
        for token in line.split_whitespace() {
            match token {
                "quit" | "q" => return,
                "reset" => {
                    handle.reset();
                }
                key => match Command::from_key(key) {
                    Some(command) => {
                        handle.command(command);
                    }
                    None => println!("unknown command '{key}'"),
                },
            }
        }
    }
}

async fn print_robot(mut rx: watch::Receiver<RobotState>) {
    loop {
        let robot = *rx.borrow_and_update();
        println!(
            "robot at ({}, {}) facing {}",
            robot.x,
            robot.y,
            robot.direction.name()
        );
        if rx.changed().await.is_err() {
            break;
        }
    }
}
