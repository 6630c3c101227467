use std::collections::HashMap;
use std::path::PathBuf;

use super::Instance;
use crate::core::state::Settings;

/// Fully resolved launch configuration: per-instance overrides layered over
/// the global defaults. Computed lazily at launch time so settings edits
/// take effect without touching every instance record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub memory_min_mb: u32,
    pub memory_max_mb: u32,
    pub window_width: u32,
    pub window_height: u32,
    pub java_path: Option<PathBuf>,
    pub java_args: Vec<String>,
    pub env_vars: HashMap<String, String>,
    pub pre_launch_hook: Option<String>,
    pub post_exit_hook: Option<String>,
    pub wrapper_command: Option<String>,
}

impl LaunchOptions {
    /// `None` on the instance means "use the global default"; any `Some`
    /// replaces the corresponding global field wholesale.
    pub fn resolve(instance: &Instance, settings: &Settings) -> Self {
        Self {
            memory_min_mb: instance.memory_min_mb.unwrap_or(settings.memory_min_mb),
            memory_max_mb: instance.memory_max_mb.unwrap_or(settings.memory_max_mb),
            window_width: instance.window_width.unwrap_or(settings.window_width),
            window_height: instance.window_height.unwrap_or(settings.window_height),
            java_path: instance
                .java_path
                .clone()
                .or_else(|| settings.java_path.clone()),
            java_args: instance
                .java_args
                .clone()
                .unwrap_or_else(|| settings.java_args.clone()),
            env_vars: instance
                .env_vars
                .clone()
                .unwrap_or_else(|| settings.env_vars.clone()),
            pre_launch_hook: instance
                .pre_launch_hook
                .clone()
                .or_else(|| settings.pre_launch_hook.clone()),
            post_exit_hook: instance
                .post_exit_hook
                .clone()
                .or_else(|| settings.post_exit_hook.clone()),
            wrapper_command: instance
                .wrapper_command
                .clone()
                .or_else(|| settings.wrapper_command.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instance::LoaderType;

    fn base_instance() -> Instance {
        Instance::new(
            "Test".into(),
            "1.20.1".into(),
            LoaderType::Fabric,
            Some("0.15.11".into()),
        )
    }

    #[test]
    fn globals_fill_unset_fields() {
        let instance = base_instance();
        let settings = Settings::default();
        let opts = LaunchOptions::resolve(&instance, &settings);

        assert_eq!(opts.memory_max_mb, settings.memory_max_mb);
        assert_eq!(opts.window_width, 854);
        assert!(opts.java_path.is_none());
    }

    #[test]
    fn instance_override_wins() {
        let mut instance = base_instance();
        instance.memory_max_mb = Some(8192);
        instance.java_args = Some(vec!["-XX:+UseG1GC".into()]);
        instance.wrapper_command = Some("gamemoderun".into());

        let mut settings = Settings::default();
        settings.java_args = vec!["-Dglobal=1".into()];

        let opts = LaunchOptions::resolve(&instance, &settings);
        assert_eq!(opts.memory_max_mb, 8192);
        assert_eq!(opts.java_args, vec!["-XX:+UseG1GC".to_string()]);
        assert_eq!(opts.wrapper_command.as_deref(), Some("gamemoderun"));
        // untouched fields still come from the globals
        assert_eq!(opts.memory_min_mb, settings.memory_min_mb);
    }
}
