// ─── Process Supervisor ───
// Owns spawned game processes: one running process per instance, live log
// pumping, exit classification (clean / killed / crashed) and idempotent
// termination.

use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use sysinfo::{Pid, ProcessesToUpdate, Signal, System};
use tracing::{error, info, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::events::{self, EventSink};
use crate::core::instance::{Instance, InstanceStore, LaunchOptions};
use crate::core::java;
use crate::core::maven::MavenArtifact;

use super::logs::RollingLog;

/// Lines buffered before a `core://instance-log` batch is flushed.
const LOG_BATCH_LINES: usize = 25;
/// Oldest a buffered line may get before the batch is flushed anyway.
const LOG_BATCH_AGE: Duration = Duration::from_millis(200);

struct RunningProcess {
    pid: u32,
    kill_requested: Arc<AtomicBool>,
}

#[derive(Default)]
pub struct ProcessSupervisor {
    running: StdMutex<HashMap<i64, RunningProcess>>,
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self, instance_id: i64) -> bool {
        self.running.lock().unwrap().contains_key(&instance_id)
    }

    /// Launch an installed instance.
    ///
    /// Rejects instances that are not `installed` (install first) and
    /// instances that already have a live process.
    pub async fn launch(
        self: &Arc<Self>,
        store: &Arc<InstanceStore>,
        events: &Arc<dyn EventSink>,
        mut instance: Instance,
        options: LaunchOptions,
        libs_dir: &Path,
    ) -> LauncherResult<u32> {
        if !instance.is_installed() {
            return Err(LauncherError::Process(format!(
                "Instance '{}' is not installed (status: {:?})",
                instance.name, instance.installation_status
            )));
        }
        if self.is_running(instance.id) {
            return Err(LauncherError::Process(format!(
                "Instance '{}' is already running",
                instance.name
            )));
        }

        let main_class = instance
            .main_class
            .clone()
            .ok_or_else(|| LauncherError::Process("Main class not set on instance".into()))?;

        // Pre-launch hook runs to completion before anything else.
        if let Some(hook) = &options.pre_launch_hook {
            run_hook(hook, &instance.game_dir(), "pre-launch")?;
        }

        let required_major = instance.required_java_major.unwrap_or_else(|| {
            java::required_java_for_minecraft_version(&instance.minecraft_version)
        });
        let java_bin =
            java::resolve_java_binary(required_major, options.java_path.as_deref()).await?;

        let classpath = build_classpath(&instance, libs_dir);
        let mut command = build_command(
            &instance,
            &options,
            &java_bin,
            &classpath,
            &main_class,
            libs_dir,
        );

        let log = RollingLog::new(&instance.logs_dir());
        log.trim_for_launch()?;

        info!("Launching instance #{} with {:?}", instance.id, java_bin);
        let mut child = command
            .spawn()
            .map_err(|e| LauncherError::Process(format!("Failed to spawn process: {e}")))?;
        let pid = child.id();

        let kill_requested = Arc::new(AtomicBool::new(false));
        self.running.lock().unwrap().insert(
            instance.id,
            RunningProcess {
                pid,
                kill_requested: kill_requested.clone(),
            },
        );

        instance.last_played = Some(Utc::now());
        instance.crashed = false;
        instance.crash_details = None;
        store.save(&instance).await?;

        events::emit(
            events,
            events::INSTANCE_LAUNCHED,
            &events::InstanceEvent {
                instance_id: instance.id,
            },
        );

        // One shared log file for both streams.
        let writer = Arc::new(StdMutex::new(log.open_writer()?));
        if let Some(stdout) = child.stdout.take() {
            spawn_log_pump(instance.id, stdout, events.clone(), writer.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_log_pump(instance.id, stderr, events.clone(), writer.clone());
        }

        // Waiter: classify the exit and persist bookkeeping.
        let supervisor = Arc::clone(self);
        let store = Arc::clone(store);
        let events = Arc::clone(events);
        let post_exit_hook = options.post_exit_hook.clone();
        let started = Instant::now();
        let instance_id = instance.id;
        let game_dir = instance.game_dir();
        tokio::spawn(async move {
            let wait_result = tokio::task::spawn_blocking(move || child.wait())
                .await
                .map_err(|e| std::io::Error::other(e.to_string()))
                .and_then(|r| r);

            supervisor.running.lock().unwrap().remove(&instance_id);
            let was_killed = kill_requested.load(Ordering::Relaxed);

            let exit_code = wait_result.as_ref().ok().and_then(|s| s.code());
            let clean_exit = wait_result.as_ref().map(|s| s.success()).unwrap_or(false);

            match store.load(instance_id).await {
                Ok(mut persisted) => {
                    let minutes = (started.elapsed().as_secs() / 60) as i64;
                    persisted.total_playtime_minutes += minutes;
                    persisted.last_played = Some(Utc::now());
                    if !clean_exit && !was_killed {
                        persisted.crashed = true;
                        persisted.crash_details = Some(match exit_code {
                            Some(code) => format!("Process exited with code {code}"),
                            None => "Process terminated without an exit code".into(),
                        });
                    }
                    if let Err(e) = store.save(&persisted).await {
                        error!("Cannot persist exit state for #{}: {}", instance_id, e);
                    }
                }
                Err(e) => error!(
                    "Cannot load instance #{} after process exit: {}",
                    instance_id, e
                ),
            }

            if was_killed {
                info!("Instance #{} killed by user", instance_id);
                events::emit(
                    &events,
                    events::INSTANCE_KILLED,
                    &events::InstanceEvent { instance_id },
                );
            } else if clean_exit {
                info!("Instance #{} exited cleanly", instance_id);
                events::emit(
                    &events,
                    events::INSTANCE_EXITED,
                    &events::InstanceExitEvent {
                        instance_id,
                        exit_code,
                    },
                );
            } else {
                warn!(
                    "Instance #{} crashed (exit code {:?})",
                    instance_id, exit_code
                );
                events::emit(
                    &events,
                    events::INSTANCE_CRASH,
                    &events::CrashEvent {
                        instance_id,
                        exit_code,
                        details: match exit_code {
                            Some(code) => format!("Process exited with code {code}"),
                            None => "Process terminated without an exit code".into(),
                        },
                    },
                );
            }

            if let Some(hook) = post_exit_hook {
                if let Err(e) = run_hook(&hook, &game_dir, "post-exit") {
                    warn!("post-exit hook failed: {}", e);
                }
            }
        });

        Ok(pid)
    }

    /// Terminate a running instance. Idempotent: killing an instance whose
    /// process already exited reports that instead of failing.
    pub fn kill(&self, instance_id: i64) -> LauncherResult<String> {
        let (pid, kill_requested) = {
            let running = self.running.lock().unwrap();
            match running.get(&instance_id) {
                Some(process) => (process.pid, process.kill_requested.clone()),
                None => return Ok("No running process for this instance".into()),
            }
        };

        kill_requested.store(true, Ordering::Relaxed);

        let mut system = System::new();
        let target = Pid::from_u32(pid);
        system.refresh_processes(ProcessesToUpdate::Some(&[target]));

        let Some(process) = system.process(target) else {
            return Ok(format!("Process {pid} already exited"));
        };

        // TERM first, escalate to KILL if it lingers.
        if process.kill_with(Signal::Term).unwrap_or(false) {
            std::thread::sleep(Duration::from_millis(300));
            system.refresh_processes(ProcessesToUpdate::Some(&[target]));
            if system.process(target).is_none() {
                return Ok(format!("Process {pid} terminated"));
            }
        }

        system.refresh_processes(ProcessesToUpdate::Some(&[target]));
        if let Some(process) = system.process(target) {
            process.kill();
        }
        Ok(format!("Process {pid} force-killed"))
    }
}

// ── Command assembly ────────────────────────────────────

fn build_classpath(instance: &Instance, libs_dir: &Path) -> String {
    let separator = if cfg!(target_os = "windows") {
        ";"
    } else {
        ":"
    };

    let mut entries: Vec<String> = Vec::new();
    for coord in &instance.libraries {
        let path = match MavenArtifact::parse(coord) {
            Ok(artifact) => libs_dir.join(artifact.local_path()),
            // Already a concrete relative path (Mojang artifact entries).
            Err(_) => libs_dir.join(coord),
        };
        entries.push(path.to_string_lossy().to_string());
    }
    entries.push(
        instance
            .path
            .join("client.jar")
            .to_string_lossy()
            .to_string(),
    );
    entries.dedup();
    entries.join(separator)
}

fn build_command(
    instance: &Instance,
    options: &LaunchOptions,
    java_bin: &Path,
    classpath: &str,
    main_class: &str,
    libs_dir: &Path,
) -> std::process::Command {
    let game_dir = instance.game_dir();
    let assets_dir = game_dir.join("assets");
    let natives_dir = instance.path.join("natives");

    let mut command = match &options.wrapper_command {
        Some(wrapper) => {
            let mut cmd = std::process::Command::new(wrapper);
            cmd.arg(java_bin);
            cmd
        }
        None => std::process::Command::new(java_bin),
    };

    command.arg(format!("-Xms{}M", options.memory_min_mb));
    command.arg(format!("-Xmx{}M", options.memory_max_mb));
    command.arg(format!(
        "-Djava.library.path={}",
        natives_dir.to_string_lossy()
    ));

    for arg in &options.java_args {
        command.arg(arg);
    }

    let substitutions =
        substitution_map(instance, options, &game_dir, &assets_dir, &natives_dir, libs_dir);

    // Loader-contributed JVM args; we always inject the classpath ourselves,
    // so stray classpath switches are dropped together with their value.
    let mut skip_next = false;
    for arg in &instance.jvm_args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "-cp" || arg == "-classpath" || arg == "--class-path" {
            skip_next = true;
            continue;
        }
        if let Some(resolved) = substitute(arg, &substitutions) {
            command.arg(resolved);
        }
    }

    command.arg("-cp").arg(classpath);
    command.arg(main_class);

    for arg in &instance.game_args {
        if let Some(resolved) = substitute(arg, &substitutions) {
            command.arg(resolved);
        }
    }

    command.arg("--width").arg(options.window_width.to_string());
    command
        .arg("--height")
        .arg(options.window_height.to_string());

    command.current_dir(&game_dir);
    command.envs(&options.env_vars);
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    command
}

fn substitution_map(
    instance: &Instance,
    options: &LaunchOptions,
    game_dir: &Path,
    assets_dir: &Path,
    natives_dir: &Path,
    libs_dir: &Path,
) -> HashMap<&'static str, String> {
    let mut map = HashMap::new();
    map.insert(
        "library_directory",
        libs_dir.to_string_lossy().to_string(),
    );
    map.insert(
        "classpath_separator",
        if cfg!(target_os = "windows") { ";" } else { ":" }.to_string(),
    );
    map.insert("version_name", instance.minecraft_version.clone());
    map.insert("game_directory", game_dir.to_string_lossy().to_string());
    map.insert("assets_root", assets_dir.to_string_lossy().to_string());
    map.insert(
        "assets_index_name",
        instance.asset_index.clone().unwrap_or_default(),
    );
    map.insert(
        "natives_directory",
        natives_dir.to_string_lossy().to_string(),
    );
    map.insert("launcher_name", "Vesta".to_string());
    map.insert("launcher_version", env!("CARGO_PKG_VERSION").to_string());
    map.insert("version_type", "release".to_string());
    map.insert("resolution_width", options.window_width.to_string());
    map.insert("resolution_height", options.window_height.to_string());
    map.insert("auth_player_name", "Player".to_string());
    map.insert("auth_uuid", uuid::Uuid::new_v4().simple().to_string());
    map.insert("auth_access_token", "0".to_string());
    map.insert("auth_xuid", String::new());
    map.insert("clientid", String::new());
    map.insert("user_type", "legacy".to_string());
    map
}

/// Replace `${placeholder}` tokens; args with placeholders we cannot
/// resolve are dropped rather than passed through verbatim.
fn substitute(arg: &str, map: &HashMap<&'static str, String>) -> Option<String> {
    let mut resolved = arg.to_string();
    for (key, value) in map {
        resolved = resolved.replace(&format!("${{{key}}}"), value);
    }
    if resolved.contains("${") {
        None
    } else {
        Some(resolved)
    }
}

fn run_hook(hook: &str, cwd: &Path, label: &str) -> LauncherResult<()> {
    info!("Running {} hook: {}", label, hook);

    #[cfg(target_os = "windows")]
    let mut command = {
        let mut cmd = std::process::Command::new("cmd");
        cmd.args(["/C", hook]);
        cmd
    };

    #[cfg(not(target_os = "windows"))]
    let mut command = {
        let mut cmd = std::process::Command::new("sh");
        cmd.args(["-c", hook]);
        cmd
    };

    let status = command
        .current_dir(cwd)
        .status()
        .map_err(|e| LauncherError::Process(format!("{label} hook failed to start: {e}")))?;

    if !status.success() {
        return Err(LauncherError::Process(format!(
            "{label} hook exited with {:?}",
            status.code()
        )));
    }
    Ok(())
}

/// Pump one stream into the rolling log and batched `core://instance-log`
/// events. Runs on a plain thread: reads block until the process closes
/// its end.
fn spawn_log_pump(
    instance_id: i64,
    stream: impl std::io::Read + Send + 'static,
    events: Arc<dyn EventSink>,
    writer: Arc<StdMutex<std::io::BufWriter<std::fs::File>>>,
) {
    std::thread::spawn(move || {
        let reader = BufReader::new(stream);
        let mut batch: Vec<events::LogLine> = Vec::new();
        let mut batch_started = Instant::now();

        for line in reader.lines().map_while(Result::ok) {
            {
                let mut writer = writer.lock().unwrap();
                RollingLog::append_line(&mut writer, &line);
            }

            if batch.is_empty() {
                batch_started = Instant::now();
            }
            batch.push(events::LogLine {
                instance_id,
                line,
            });

            if batch.len() >= LOG_BATCH_LINES || batch_started.elapsed() >= LOG_BATCH_AGE {
                flush_batch(&events, &mut batch);
            }
        }

        flush_batch(&events, &mut batch);
    });
}

fn flush_batch(events: &Arc<dyn EventSink>, batch: &mut Vec<events::LogLine>) {
    if batch.is_empty() {
        return;
    }
    events::emit(
        events,
        events::INSTANCE_LOG,
        &events::LogBatch {
            lines: std::mem::take(batch),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instance::LoaderType;
    use std::path::PathBuf;

    #[test]
    fn kill_on_untracked_instance_is_idempotent() {
        let supervisor = ProcessSupervisor::new();
        let status = supervisor.kill(42).unwrap();
        assert_eq!(status, "No running process for this instance");
    }

    #[test]
    fn classpath_contains_libraries_and_client_jar() {
        let mut instance = Instance::new(
            "CP".into(),
            "1.20.1".into(),
            LoaderType::Fabric,
            Some("0.15.11".into()),
        );
        instance.path = PathBuf::from("/data/instances/cp");
        instance.libraries = vec![
            "net.fabricmc:fabric-loader:0.15.11".into(),
            "com/example/lib/1.0/lib-1.0.jar".into(),
        ];

        let classpath = build_classpath(&instance, Path::new("/data/libraries"));
        assert!(classpath.contains("fabric-loader-0.15.11.jar"));
        assert!(classpath.contains("com/example/lib/1.0/lib-1.0.jar"));
        assert!(classpath.contains("client.jar"));
    }

    #[test]
    fn substitute_drops_unresolved_placeholders() {
        let mut map = HashMap::new();
        map.insert("version_name", "1.20.1".to_string());

        assert_eq!(
            substitute("--version=${version_name}", &map),
            Some("--version=1.20.1".to_string())
        );
        assert_eq!(substitute("${quickPlayPath}", &map), None);
        assert_eq!(substitute("--plain", &map), Some("--plain".to_string()));
    }
}
