//! Run loop: wires stream watcher → classifier → orchestrator → sinks.
//!
//! One tokio interval drives the fixed-rate logic tick; there is no render
//! clock here (headless), so every interval fire is exactly one logic step.
//! A renderer embedding the core would put a `FrameScheduler` between its
//! display callback and `Runtime::step`.

use std::path::PathBuf;

use chrono::Utc;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, info};

use puppet_core::ik::Vec3;
use puppet_core::orchestrator::{CameraSink, Orchestrator, OverlaySink, RigSink, Sinks};
use puppet_core::scheduler::FrameScheduler;
use puppet_core::types::ActivityState;
use puppet_rig::QwertyLayout;
use puppet_rig::sinks::{TracingCamera, TracingOverlay, TracingRig};
use puppet_source_stream::{SessionStats, StreamWatcher, parse_line};

use crate::cli::RunOpts;

/// Center of the home row on the desk.
const KEYBOARD_ORIGIN: Vec3 = Vec3::new(0.0, 0.74, 0.25);

/// Hand rest positions, just above and behind the keyboard.
const LEFT_REST: Vec3 = Vec3::new(-0.15, 0.95, 0.18);
const RIGHT_REST: Vec3 = Vec3::new(0.15, 0.95, 0.18);

/// Everything the loop owns apart from the sinks.
pub struct Runtime {
    watcher: StreamWatcher,
    orchestrator: Orchestrator,
    stats: SessionStats,
    layout: QwertyLayout,
    last_state: ActivityState,
    dt: f32,
}

impl Runtime {
    pub fn new(stream: PathBuf, tick_hz: u32, from_start: bool) -> Self {
        let watcher = if from_start {
            StreamWatcher::from_start(stream)
        } else {
            StreamWatcher::new(stream)
        };
        Self {
            watcher,
            orchestrator: Orchestrator::new(LEFT_REST, RIGHT_REST),
            stats: SessionStats::new(),
            layout: QwertyLayout::new(KEYBOARD_ORIGIN),
            last_state: ActivityState::Idle,
            dt: 1.0 / tick_hz.max(1) as f32,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// One logic step: drain new stream lines, then advance animation.
    pub fn step(
        &mut self,
        rig: &mut dyn RigSink,
        overlay: &mut dyn OverlaySink,
        camera: &mut dyn CameraSink,
    ) {
        let now = Utc::now();

        for line in self.watcher.poll_new_lines() {
            match parse_line(&line) {
                Ok(envelope) => {
                    self.stats.update(envelope.ts, &envelope.event);
                    let mut sinks = Sinks {
                        rig,
                        overlay,
                        camera,
                        keyboard: &self.layout,
                    };
                    self.orchestrator
                        .process_event(&envelope.event, now, &mut sinks);
                }
                Err(e) => debug!(error = %e, "dropped stream line"),
            }
        }

        let mut sinks = Sinks {
            rig,
            overlay,
            camera,
            keyboard: &self.layout,
        };
        self.orchestrator.tick(self.dt, now, &mut sinks);

        let state = self.orchestrator.state();
        if state != self.last_state {
            info!(
                state = %state,
                mode = ?self.orchestrator.typing_mode(),
                tasks = self.stats.active_tasks(),
                "activity"
            );
            self.last_state = state;
        }
    }
}

/// Run until ctrl-c / SIGTERM.
pub async fn run(opts: RunOpts) -> anyhow::Result<()> {
    info!(stream = %opts.stream.display(), tick_hz = opts.tick_hz, "puppet starting");

    let mut runtime = Runtime::new(opts.stream, opts.tick_hz, opts.from_start);
    let mut rig = TracingRig::new();
    let mut overlay = TracingOverlay;
    let mut camera = TracingCamera;

    // The interval only paces wake-ups; the scheduler converts real elapsed
    // time into fixed logic steps, so a delayed wake-up catches up instead
    // of drifting.
    let mut ticker = interval(Duration::from_secs_f64(1.0 / opts.tick_hz.max(1) as f64));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut scheduler = FrameScheduler::new(opts.tick_hz.max(1) as f32);
    let mut last_wake = tokio::time::Instant::now();

    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => info!("received ctrl-c, shutting down"),
                _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            info!("received ctrl-c, shutting down");
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = tokio::time::Instant::now();
                let steps = scheduler.advance((now - last_wake).as_secs_f32());
                last_wake = now;
                for _ in 0..steps {
                    runtime.step(&mut rig, &mut overlay, &mut camera);
                }
            }
            () = &mut shutdown => break,
        }
    }

    info!("puppet stopped");
    Ok(())
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use puppet_core::types::TypingMode;
    use puppet_rig::sinks::{RecordingCamera, RecordingOverlay, RecordingRig};
    use std::fs;
    use std::io::Write;
    use std::path::Path;

    fn temp_stream(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("puppet-test-runtime");
        fs::create_dir_all(&dir).expect("test");
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        fs::write(&path, "").expect("test");
        path
    }

    fn append(path: &Path, line: &str) {
        let mut f = fs::OpenOptions::new()
            .append(true)
            .open(path)
            .expect("test");
        writeln!(f, "{line}").expect("test");
    }

    fn steps(
        runtime: &mut Runtime,
        n: usize,
    ) -> (RecordingRig, RecordingOverlay, RecordingCamera) {
        let mut rig = RecordingRig::new();
        let mut overlay = RecordingOverlay::default();
        let mut camera = RecordingCamera::default();
        for _ in 0..n {
            runtime.step(&mut rig, &mut overlay, &mut camera);
        }
        (rig, overlay, camera)
    }

    #[tokio::test]
    async fn stream_lines_drive_the_state_machine() {
        let path = temp_stream("drives-machine.jsonl");
        let mut runtime = Runtime::new(path.clone(), 60, false);

        append(
            &path,
            r#"{"ts": "2026-03-01T12:00:00Z", "event": {"type": "system", "subtype": "init"}}"#,
        );
        steps(&mut runtime, 2);
        assert_eq!(runtime.orchestrator().state(), ActivityState::Waking);

        append(
            &path,
            r#"{"event": {"type": "assistant", "message": {"content": [
                {"type": "tool_use", "id": "t1", "name": "Bash", "input": {"command": "ls"}}
            ]}}}"#
                .replace('\n', " ")
                .as_str(),
        );
        steps(&mut runtime, 2);
        assert_eq!(runtime.orchestrator().state(), ActivityState::Terminal);

        let _ = fs::remove_file(&path);
    }

    #[tokio::test]
    async fn send_message_scenario_end_to_end() {
        let path = temp_stream("send-e2e.jsonl");
        let mut runtime = Runtime::new(path.clone(), 60, false);

        let send = r#"{"event": {"type": "assistant", "message": {"content": [{"type": "tool_use", "id": "t1", "name": "Bash", "input": {"command": "curl -X POST http://localhost:8945/api/send_message -d '{\"channel_id\": \"7\", \"content\": \"hi\"}'"}}]}}}"#;
        let result = r#"{"event": {"type": "user", "message": {"content": [{"type": "tool_result", "tool_use_id": "t1", "content": "ok", "is_error": false}]}}}"#;
        append(&path, send);
        append(&path, result);

        // ~5 simulated seconds at 60 Hz: typing, travel and trailing delay.
        let (rig, overlay, _camera) = steps(&mut runtime, 300);

        let chat = runtime.orchestrator().chat();
        assert!(!chat.session_active());
        let log = chat.channel("general").expect("log");
        assert_eq!(log.latest().expect("msg").content, "hi");
        assert_eq!(rig.presses, vec!['h', 'i']);
        assert!(overlay.calls.contains(&"finish_typing".to_owned()));
        assert_eq!(runtime.orchestrator().typing_mode(), TypingMode::None);

        let _ = fs::remove_file(&path);
    }

    #[tokio::test]
    async fn malformed_lines_are_dropped_silently() {
        let path = temp_stream("malformed.jsonl");
        let mut runtime = Runtime::new(path.clone(), 60, false);

        append(&path, "not json");
        append(&path, r#"{"event": {"type": "result"}}"#);
        steps(&mut runtime, 2);
        assert_eq!(runtime.orchestrator().state(), ActivityState::Done);

        let _ = fs::remove_file(&path);
    }

    #[tokio::test]
    async fn stats_fold_alongside_animation() {
        let path = temp_stream("stats.jsonl");
        let mut runtime = Runtime::new(path.clone(), 60, false);

        append(
            &path,
            r#"{"ts": "2026-03-01T12:00:00Z", "event": {"type": "result", "total_cost_usd": 0.42}}"#,
        );
        steps(&mut runtime, 2);
        assert!((runtime.stats().session_cost_usd - 0.42).abs() < 1e-9);

        let _ = fs::remove_file(&path);
    }
}
