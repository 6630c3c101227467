mod commands;
mod core;

use std::sync::Arc;

use tauri::Manager;
use tracing_subscriber::EnvFilter;

use crate::core::events::EventSink;
use crate::core::state::AppState;

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,vesta_lib=debug")),
        )
        .init();

    tracing::info!("Vesta backend starting...");

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let events: Arc<dyn EventSink> = Arc::new(app.handle().clone());
            let state = Arc::new(AppState::new(events)?);
            app.manage(state.clone());

            // Startup pass runs off the main thread: index instances,
            // surface interrupted operations, sweep old notifications.
            tauri::async_runtime::spawn(async move {
                if let Err(e) = state.startup().await {
                    tracing::error!("Startup reconciliation failed: {}", e);
                }
            });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::create_instance,
            commands::update_instance,
            commands::list_instances,
            commands::delete_instance,
            commands::duplicate_instance,
            commands::install_instance,
            commands::repair_instance,
            commands::reset_instance,
            commands::resume_instance,
            commands::launch_instance,
            commands::kill_instance,
            commands::is_instance_running,
            commands::get_instance_log,
            commands::sync_instance_resources,
            commands::toggle_resource,
            commands::delete_resource,
            commands::check_resource_updates,
            commands::apply_resource_update,
            commands::get_minecraft_versions,
            commands::get_loader_versions,
            commands::regenerate_piston_manifest,
            commands::create_notification,
            commands::update_notification_progress,
            commands::list_notifications,
            commands::cancel_task,
            commands::get_settings,
            commands::update_settings,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
