//! Watch-mode supervisor: run one sandboxed child, restart it when the
//! project tree changes.
//!
//! Every input (filesystem events, watcher errors, debounce fires, child
//! exits, shutdown) arrives on one channel; the loop blocks on it and never
//! polls. Supervisor state sits behind a single mutex. The previous child is
//! always stopped and reaped before the next one starts.

use lagoon_core::config::WatchConfig;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::process::{Child, ExitStatus};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::thread;

use crate::debounce::DebounceTimer;
use crate::info_log;
use crate::launcher::ChildLauncher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Running,
    Restarting,
    Stopped,
}

#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// A qualifying change under the watched tree.
    FsChanged,
    FsError(String),
    Debounced,
    ChildExited {
        generation: u64,
        status: Option<ExitStatus>,
    },
    Shutdown,
}

/// The live child: pid, completion signal and the command that spawned it.
/// The `Child` itself belongs to the reaper thread.
#[derive(Debug)]
pub struct SupervisedProcess {
    pub pid: u32,
    pub generation: u64,
    pub command: String,
    done: Receiver<Option<ExitStatus>>,
}

struct Inner {
    state: SupervisorState,
    current: Option<SupervisedProcess>,
    generation: u64,
    launches: u64,
}

pub struct Supervisor<L: ChildLauncher> {
    launcher: L,
    config: WatchConfig,
    project: String,
    inner: Mutex<Inner>,
    tx: Sender<WatchEvent>,
    rx: Mutex<Receiver<WatchEvent>>,
}

impl<L: ChildLauncher> Supervisor<L> {
    pub fn new(launcher: L, config: WatchConfig, project: &Path) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            launcher,
            config,
            project: project.to_string_lossy().to_string(),
            inner: Mutex::new(Inner {
                state: SupervisorState::Idle,
                current: None,
                generation: 0,
                launches: 0,
            }),
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Sender for feeding events in (signal handler, filesystem watcher).
    pub fn events(&self) -> Sender<WatchEvent> {
        self.tx.clone()
    }

    pub fn state(&self) -> SupervisorState {
        self.lock().state
    }

    /// Pid of the live child, if any.
    pub fn current_pid(&self) -> Option<u32> {
        self.lock().current.as_ref().map(|p| p.pid)
    }

    /// Number of successful launches so far.
    pub fn launches(&self) -> u64 {
        self.lock().launches
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a panic mid-update; the data is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: SupervisorState) {
        self.lock().state = state;
    }

    /// Launch the first child, then process events until shutdown.
    pub fn run(&self) -> SupervisorState {
        let rx = self.rx.lock().unwrap_or_else(|e| e.into_inner());
        let timer = DebounceTimer::new(self.config.debounce, self.tx.clone(), WatchEvent::Debounced);

        self.launch();

        loop {
            let event = match rx.recv() {
                Ok(e) => e,
                Err(_) => break,
            };
            match event {
                WatchEvent::FsChanged => timer.arm(),
                WatchEvent::FsError(e) => {
                    tracing::warn!("watch error: {}", e);
                    eprintln!("⚠ watch error: {}", e);
                }
                WatchEvent::Debounced => self.restart(),
                WatchEvent::ChildExited { generation, status } => {
                    self.on_child_exit(generation, status)
                }
                WatchEvent::Shutdown => {
                    timer.cancel();
                    self.stop_current();
                    break;
                }
            }
        }

        self.set_state(SupervisorState::Stopped);
        SupervisorState::Stopped
    }

    fn launch(&self) {
        let command = self.launcher.command_line().to_string();
        eprintln!("! starting: {}", command);
        let child = match self.launcher.launch() {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("launch failed: {}", e);
                eprintln!("✗ {}", e);
                self.set_state(SupervisorState::Idle);
                return;
            }
        };

        let mut inner = self.lock();
        inner.generation += 1;
        inner.launches += 1;
        let generation = inner.generation;
        let pid = child.id();
        let done = spawn_reaper(child, generation, self.tx.clone());
        inner.current = Some(SupervisedProcess {
            pid,
            generation,
            command: command.clone(),
            done,
        });
        inner.state = SupervisorState::Running;
        drop(inner);

        info_log!("started pid {} (generation {})", pid, generation);
    }

    fn restart(&self) {
        self.set_state(SupervisorState::Restarting);
        self.stop_current();
        eprintln!("\n! file changed, restarting");
        let generation = self.lock().generation + 1;
        lagoon_core::observability::audit_watch_restart(
            &self.project,
            self.launcher.command_line(),
            generation,
        );
        self.launch();
    }

    /// Stop and reap the live child: SIGTERM, wait up to the grace period,
    /// then SIGKILL.
    fn stop_current(&self) {
        let current = self.lock().current.take();
        let Some(process) = current else {
            return;
        };
        match process.done.try_recv() {
            Ok(_) | Err(mpsc::TryRecvError::Disconnected) => return,
            Err(mpsc::TryRecvError::Empty) => {}
        }

        send_signal(process.pid, Signal::Term);
        match process.done.recv_timeout(self.config.grace) {
            Ok(_) | Err(RecvTimeoutError::Disconnected) => {}
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!(pid = process.pid, "grace period elapsed, killing");
                send_signal(process.pid, Signal::Kill);
                let _ = process.done.recv();
            }
        }
    }

    fn on_child_exit(&self, generation: u64, status: Option<ExitStatus>) {
        let mut inner = self.lock();
        let is_current = inner
            .current
            .as_ref()
            .map(|p| p.generation == generation)
            .unwrap_or(false);
        if !is_current {
            // Exit of a child we already stopped.
            return;
        }
        inner.current = None;
        inner.state = SupervisorState::Idle;
        drop(inner);

        match status {
            Some(s) if s.success() => eprintln!("✓ command exited; waiting for changes"),
            Some(s) => eprintln!("⚠ command exited ({}); waiting for changes", s),
            None => eprintln!("⚠ command exited; waiting for changes"),
        }
        tracing::info!(generation, ?status, "child exited on its own");
    }
}

/// Own `child` on a background thread; publish its exit on the returned
/// receiver and as a `ChildExited` event.
fn spawn_reaper(
    mut child: Child,
    generation: u64,
    events: Sender<WatchEvent>,
) -> Receiver<Option<ExitStatus>> {
    let (done_tx, done_rx) = mpsc::channel();
    thread::spawn(move || {
        let status = child.wait().ok();
        let _ = done_tx.send(status);
        let _ = events.send(WatchEvent::ChildExited { generation, status });
    });
    done_rx
}

enum Signal {
    Term,
    Kill,
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: Signal) {
    use nix::sys::signal::{kill, Signal as NixSignal};
    use nix::unistd::Pid;

    let sig = match signal {
        Signal::Term => NixSignal::SIGTERM,
        Signal::Kill => NixSignal::SIGKILL,
    };
    if let Err(e) = kill(Pid::from_raw(pid as i32), sig) {
        tracing::debug!(pid, "signal {:?} failed: {}", sig, e);
    }
}

#[cfg(not(unix))]
fn send_signal(pid: u32, _signal: Signal) {
    tracing::warn!(pid, "signals are not supported on this platform");
}

/// Whether a filesystem event should trigger a restart.
pub fn is_qualifying(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Remove(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
    )
}

/// Recursively watch `root`, forwarding qualifying changes and errors to
/// `events`. The returned watcher must be kept alive for as long as events
/// are wanted.
pub fn watch_tree(root: &Path, events: Sender<WatchEvent>) -> notify::Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) if is_qualifying(&event.kind) => {
            let _ = events.send(WatchEvent::FsChanged);
        }
        Ok(_) => {}
        Err(e) => {
            let _ = events.send(WatchEvent::FsError(e.to_string()));
        }
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    Ok(watcher)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::launcher::LaunchError;
    use notify::event::{AccessKind, CreateKind, DataChange};
    use std::process::{Command, Stdio};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    /// Launches a plain host command instead of a sandbox.
    struct ShellLauncher {
        script: String,
        starts: AtomicU64,
    }

    impl ShellLauncher {
        fn new(script: &str) -> Self {
            Self {
                script: script.to_string(),
                starts: AtomicU64::new(0),
            }
        }
    }

    impl ChildLauncher for ShellLauncher {
        fn launch(&self) -> Result<Child, LaunchError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Command::new("/bin/sh")
                .arg("-c")
                .arg(&self.script)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|e| LaunchError::Spawn {
                    program: "/bin/sh".to_string(),
                    source: e,
                })
        }

        fn command_line(&self) -> &str {
            &self.script
        }
    }

    struct FailingLauncher;

    impl ChildLauncher for FailingLauncher {
        fn launch(&self) -> Result<Child, LaunchError> {
            Err(LaunchError::MemoryRequiresSystemd {
                tool: "systemd-run".to_string(),
            })
        }

        fn command_line(&self) -> &str {
            "nothing"
        }
    }

    fn config() -> WatchConfig {
        WatchConfig {
            debounce: Duration::from_millis(50),
            grace: Duration::from_millis(200),
        }
    }

    fn wait_until<F: Fn() -> bool>(f: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if f() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn pid_alive(pid: u32) -> bool {
        nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
    }

    #[test]
    fn test_qualifying_events() {
        assert!(is_qualifying(&EventKind::Create(CreateKind::File)));
        assert!(is_qualifying(&EventKind::Modify(ModifyKind::Data(DataChange::Content))));
        assert!(is_qualifying(&EventKind::Modify(ModifyKind::Any)));
        assert!(!is_qualifying(&EventKind::Access(AccessKind::Read)));
    }

    #[test]
    fn test_burst_restarts_once_and_shutdown_stops_child() {
        let sup = Arc::new(Supervisor::new(
            ShellLauncher::new("sleep 30"),
            config(),
            Path::new("/tmp/project"),
        ));
        let tx = sup.events();
        let runner = {
            let sup = Arc::clone(&sup);
            thread::spawn(move || sup.run())
        };

        assert!(wait_until(|| sup.current_pid().is_some()));
        let first = sup.current_pid().unwrap();

        for _ in 0..5 {
            tx.send(WatchEvent::FsChanged).unwrap();
        }
        assert!(wait_until(|| sup.launches() == 2));
        let second = sup.current_pid().unwrap();
        assert_ne!(first, second);
        assert!(!pid_alive(first));

        // Nothing else pending: still two launches after a further window.
        thread::sleep(Duration::from_millis(200));
        assert_eq!(sup.launches(), 2);
        assert_eq!(sup.state(), SupervisorState::Running);

        tx.send(WatchEvent::Shutdown).unwrap();
        assert_eq!(runner.join().unwrap(), SupervisorState::Stopped);
        assert!(!pid_alive(second));
        assert_eq!(sup.current_pid(), None);
    }

    #[test]
    fn test_sigterm_ignoring_child_is_killed_after_grace() {
        let sup = Arc::new(Supervisor::new(
            ShellLauncher::new("trap '' TERM; while true; do sleep 1; done"),
            config(),
            Path::new("/tmp/project"),
        ));
        let tx = sup.events();
        let runner = {
            let sup = Arc::clone(&sup);
            thread::spawn(move || sup.run())
        };
        assert!(wait_until(|| sup.current_pid().is_some()));
        let pid = sup.current_pid().unwrap();
        // Let the shell install its trap.
        thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        tx.send(WatchEvent::Shutdown).unwrap();
        runner.join().unwrap();
        assert!(started.elapsed() >= config().grace);
        assert!(!pid_alive(pid));
    }

    #[test]
    fn test_child_exit_goes_idle_and_change_relaunches() {
        let launcher = ShellLauncher::new("exit 0");
        let sup = Arc::new(Supervisor::new(launcher, config(), Path::new("/tmp/project")));
        let tx = sup.events();
        let runner = {
            let sup = Arc::clone(&sup);
            thread::spawn(move || sup.run())
        };

        assert!(wait_until(|| sup.launches() == 1 && sup.state() == SupervisorState::Idle));
        assert_eq!(sup.current_pid(), None);

        tx.send(WatchEvent::FsChanged).unwrap();
        assert!(wait_until(|| sup.launches() == 2));

        tx.send(WatchEvent::Shutdown).unwrap();
        runner.join().unwrap();
    }

    #[test]
    fn test_launch_failure_keeps_watching() {
        let sup = Arc::new(Supervisor::new(FailingLauncher, config(), Path::new("/tmp/project")));
        let tx = sup.events();
        let runner = {
            let sup = Arc::clone(&sup);
            thread::spawn(move || sup.run())
        };
        tx.send(WatchEvent::FsError("inotify limit".to_string())).unwrap();
        tx.send(WatchEvent::FsChanged).unwrap();
        thread::sleep(Duration::from_millis(200));
        assert_eq!(sup.state(), SupervisorState::Idle);
        assert_eq!(sup.launches(), 0);

        tx.send(WatchEvent::Shutdown).unwrap();
        assert_eq!(runner.join().unwrap(), SupervisorState::Stopped);
    }

    #[test]
    fn test_watch_tree_reports_file_creation() {
        let tmp = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel();
        let _watcher = watch_tree(tmp.path(), tx).unwrap();
        std::fs::write(tmp.path().join("main.py"), b"print(1)\n").unwrap();
        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(event, WatchEvent::FsChanged));
    }
}
