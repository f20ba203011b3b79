//! Process lifecycle for the background daemon: fork, pid file, exclusive
//! lock file, socket-liveness polling — the same shape this workspace's
//! daemon launcher has always used, adapted to the scheduler daemon.

use std::fs;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Result, bail};
use fs2::FileExt;
use memloop_config::AppConfig;
use memloop_runtime::{ClientCommand, DaemonClient, ServerEvent};

#[derive(Debug, Clone)]
pub(crate) struct DaemonPaths {
    runtime_dir: PathBuf,
    pub(crate) pid_file: PathBuf,
    /// Captures the forked child's raw stdout/stderr as a fallback for
    /// anything that escapes the tracing subscriber (panics, early startup
    /// failures before logging is initialized).
    stderr_file: PathBuf,
    pub(crate) lock_file: PathBuf,
}

pub(crate) fn daemon_paths() -> DaemonPaths {
    let runtime_dir = Path::new(".memory-loop").join("runtime");
    DaemonPaths {
        pid_file: runtime_dir.join("daemon.pid"),
        stderr_file: runtime_dir.join("daemon.stderr.log"),
        lock_file: runtime_dir.join("daemon.lock"),
        runtime_dir,
    }
}

impl DaemonPaths {
    /// Directory the daemon process's rotating `tracing-appender` log file
    /// lives in, distinct from `stderr_file`.
    pub(crate) fn log_dir(&self) -> &Path {
        &self.runtime_dir
    }
}

pub(crate) fn daemon_start(config: &AppConfig, force: bool) -> Result<()> {
    let paths = daemon_paths();
    fs::create_dir_all(&paths.runtime_dir)?;
    let socket_path = PathBuf::from(&config.paths.socket_path);

    if is_socket_live(&socket_path) && !force {
        bail!("daemon already running on socket {}; use `--force` to restart", socket_path.display());
    }

    if let Some(pid) = read_pid(&paths.pid_file)? {
        if is_pid_running(pid) {
            if !force {
                bail!("daemon already running with pid {pid}; pass --force to restart");
            }
            terminate_pid(pid)?;
        }
        let _ = fs::remove_file(&paths.pid_file);
    }

    if socket_path.exists() {
        let _ = fs::remove_file(&socket_path);
    }
    if force && paths.lock_file.exists() {
        let _ = fs::remove_file(&paths.lock_file);
    }

    let exe = std::env::current_exe()?;
    let out = OpenOptions::new().create(true).append(true).open(&paths.stderr_file)?;
    let err = out.try_clone()?;

    let mut child = Command::new(exe)
        .arg("run")
        .env("MEMORY_LOOP_DAEMON_PROCESS", "1")
        .stdin(Stdio::null())
        .stdout(Stdio::from(out))
        .stderr(Stdio::from(err))
        .spawn()?;

    fs::write(&paths.pid_file, child.id().to_string())?;

    for _ in 0..40 {
        if is_socket_live(&socket_path) {
            println!("daemon started");
            println!("- pid: {}", child.id());
            println!("- socket: {}", socket_path.display());
            println!("- log: {}", paths.stderr_file.display());
            return Ok(());
        }
        if let Some(status) = child.try_wait()? {
            let _ = fs::remove_file(&paths.pid_file);
            bail!("daemon exited during startup with status {status}; check {}", paths.stderr_file.display());
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    let _ = fs::remove_file(&paths.pid_file);
    bail!("daemon did not become ready on socket {}; check {}", socket_path.display(), paths.stderr_file.display())
}

pub(crate) async fn daemon_stop(config: &AppConfig) -> Result<()> {
    let paths = daemon_paths();
    let client = DaemonClient::new(&config.paths.socket_path);
    if let Ok(ServerEvent::Ack(_)) = client.send(ClientCommand::Shutdown).await {
        println!("daemon stop requested gracefully");
    }

    let Some(pid) = read_pid(&paths.pid_file)? else {
        println!("daemon is not running");
        return Ok(());
    };

    if !is_pid_running(pid) {
        let _ = fs::remove_file(&paths.pid_file);
        println!("daemon was not running (stale pid file cleaned)");
        return Ok(());
    }

    wait_for_pid_exit(pid, Duration::from_secs(4));
    if is_pid_running(pid) {
        terminate_pid(pid)?;
        wait_for_pid_exit(pid, Duration::from_secs(4));
    }
    let _ = fs::remove_file(&paths.pid_file);
    let _ = fs::remove_file(&paths.lock_file);
    println!("daemon stopped (pid {pid})");
    Ok(())
}

fn wait_for_pid_exit(pid: u32, timeout: Duration) {
    let step = Duration::from_millis(50);
    let mut waited = Duration::from_millis(0);
    while waited < timeout {
        if !is_pid_running(pid) {
            return;
        }
        std::thread::sleep(step);
        waited += step;
    }
}

pub(crate) async fn daemon_status(config: &AppConfig) -> Result<()> {
    let paths = daemon_paths();
    let socket_path = PathBuf::from(&config.paths.socket_path);
    let socket_live = is_socket_live(&socket_path);

    let running = match read_pid(&paths.pid_file)? {
        Some(pid) => is_pid_running(pid) || socket_live,
        None => socket_live,
    };

    if !running {
        println!("daemon status: stopped");
        return Ok(());
    }

    println!("daemon status: running");
    println!("- socket: {}", socket_path.display());

    let client = DaemonClient::new(&config.paths.socket_path);
    if let Ok(ServerEvent::Status(status)) = client.send(ClientCommand::GetStatus).await {
        println!("- vaults: {}", status.vaults.join(", "));
        println!("- uptime: {}s", status.uptime_secs);
        println!("- sync: last_run={:?} running={}", status.sync.last_run_at, status.sync.running);
        println!("- extraction: last_run={:?} running={}", status.extraction.last_run_at, status.extraction.running);
        println!(
            "- card discovery: last_run={:?} running={}",
            status.card_discovery.last_run_at, status.card_discovery.running
        );
        if !status.recovered_on_last_start.is_empty() {
            println!(
                "- recovered a crashed extraction sandbox on startup for: {}",
                status.recovered_on_last_start.join(", ")
            );
        }
    }

    Ok(())
}

pub(crate) async fn run_daemon_process(config: AppConfig) -> Result<()> {
    let paths = daemon_paths();
    fs::create_dir_all(&paths.runtime_dir)?;
    let lock_file = std::fs::File::create(&paths.lock_file)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|_| anyhow::anyhow!("another daemon instance already holds the lock"))?;

    fs::write(&paths.pid_file, std::process::id().to_string())?;

    let result = memloop_runtime::run(config).await;

    let _ = fs::remove_file(&paths.pid_file);
    let _ = fs::remove_file(&paths.lock_file);
    result
}

fn is_socket_live(path: &Path) -> bool {
    std::os::unix::net::UnixStream::connect(path).is_ok()
}

fn read_pid(path: &Path) -> Result<Option<u32>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)?;
    Ok(raw.trim().parse::<u32>().ok())
}

fn is_pid_running(pid: u32) -> bool {
    Command::new("kill").arg("-0").arg(pid.to_string()).status().map(|status| status.success()).unwrap_or(false)
}

fn terminate_pid(pid: u32) -> Result<()> {
    let status = Command::new("kill").arg(pid.to_string()).status()?;
    if !status.success() {
        bail!("failed to terminate daemon pid {pid}");
    }
    Ok(())
}
