// Prevents additional console window on Windows in release
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

// Module declarations
mod dispatcher;
mod gemini;
mod media;
mod models;
mod paths;
mod prompts;
mod store;

use std::collections::HashMap;
use std::sync::Mutex;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::{error, info, warn};
use serde_json::json;
use tauri::{command, AppHandle, Emitter, State};

use gemini::GeminiClient;
use models::{JobView, NewUpload, ProcessingStatus, StylePreset, StyleSelection};
use store::{JobStore, UploadMode};

// ============ App State ============

/// Session state for the whole application. Everything lives in memory
/// and dies with the process; nothing here is persisted.
#[derive(Default)]
pub struct AppState {
    pub store: Mutex<JobStore>,
    pub api_key: Mutex<Option<String>>,
    pub style: Mutex<StyleSelection>,
    pub dark_mode: Mutex<bool>,
    pub fragment_cache: Mutex<HashMap<String, String>>,
}

// ============ Credential Commands ============

#[command]
async fn set_api_key(state: State<'_, AppState>, key: String) -> Result<(), String> {
    let trimmed = key.trim();
    let mut slot = state.api_key.lock().unwrap();
    if trimmed.is_empty() {
        *slot = None;
        info!("[config] API key cleared");
    } else {
        *slot = Some(trimmed.to_string());
        info!("[config] API key set");
    }
    Ok(())
}

#[command]
async fn has_api_key(state: State<'_, AppState>) -> Result<bool, String> {
    Ok(state.api_key.lock().unwrap().is_some())
}

// ============ Mode & Job Commands ============

#[command]
async fn get_upload_mode(state: State<'_, AppState>) -> Result<UploadMode, String> {
    Ok(state.store.lock().unwrap().mode())
}

/// Selecting a mode always starts from a clean batch.
#[command]
async fn set_upload_mode(
    state: State<'_, AppState>,
    mode: UploadMode,
) -> Result<Vec<JobView>, String> {
    let mut store = state.store.lock().unwrap();
    store.set_mode(mode);
    Ok(store.views())
}

#[command]
async fn add_jobs(
    state: State<'_, AppState>,
    files: Vec<NewUpload>,
) -> Result<Vec<JobView>, String> {
    info!("[upload] received {} file(s)", files.len());
    state.store.lock().unwrap().add_uploads(files)
}

/// Upload path for the native open dialog: the webview hands us paths,
/// we read the bytes.
#[command]
async fn add_jobs_from_paths(
    state: State<'_, AppState>,
    paths: Vec<String>,
) -> Result<Vec<JobView>, String> {
    let mut uploads = Vec::with_capacity(paths.len());
    for path in paths {
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| format!("Failed to read file {}: {}", path, e))?;
        let file_name = std::path::Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.clone());
        uploads.push(NewUpload { file_name, data });
    }
    info!("[upload] read {} file(s) from disk", uploads.len());
    state.store.lock().unwrap().add_uploads(uploads)
}

#[command]
async fn get_jobs(state: State<'_, AppState>) -> Result<Vec<JobView>, String> {
    Ok(state.store.lock().unwrap().views())
}

#[command]
async fn get_active_index(state: State<'_, AppState>) -> Result<usize, String> {
    Ok(state.store.lock().unwrap().active_index())
}

#[command]
async fn select_job(state: State<'_, AppState>, index: usize) -> Result<usize, String> {
    let mut store = state.store.lock().unwrap();
    store.select(index);
    Ok(store.active_index())
}

#[command]
async fn remove_active_job(state: State<'_, AppState>) -> Result<Vec<JobView>, String> {
    let mut store = state.store.lock().unwrap();
    store.remove_active();
    Ok(store.views())
}

/// Records or clears the annotation canvas output (PNG bytes) for the
/// active job.
#[command]
async fn set_annotation(
    state: State<'_, AppState>,
    data: Option<Vec<u8>>,
) -> Result<Vec<JobView>, String> {
    let mut store = state.store.lock().unwrap();
    store.set_annotation(data);
    Ok(store.views())
}

#[command]
async fn clear_jobs(state: State<'_, AppState>) -> Result<(), String> {
    state.store.lock().unwrap().clear();
    Ok(())
}

/// Returns one of a job's images as a data URL for display.
#[command]
async fn get_job_preview(
    state: State<'_, AppState>,
    job_id: String,
    source: String,
) -> Result<String, String> {
    let store = state.store.lock().unwrap();
    let job = store
        .job(&job_id)
        .ok_or_else(|| "Unknown job id".to_string())?;

    let (bytes, mime) = match source.as_str() {
        "original" => (job.original.as_slice(), job.mime_type.as_str()),
        "annotated" => (
            job.annotated
                .as_deref()
                .ok_or_else(|| "This job has no annotation".to_string())?,
            "image/png",
        ),
        "result" => (
            job.result
                .as_deref()
                .ok_or_else(|| "This job has no result yet".to_string())?,
            "image/png",
        ),
        other => return Err(format!("Unknown preview source: {}", other)),
    };

    Ok(format!("data:{};base64,{}", mime, BASE64.encode(bytes)))
}

/// Writes a finished sticker to a user-chosen path.
#[command]
async fn save_result(
    state: State<'_, AppState>,
    job_id: String,
    dest_path: String,
) -> Result<(), String> {
    let bytes = {
        let store = state.store.lock().unwrap();
        let job = store
            .job(&job_id)
            .ok_or_else(|| "Unknown job id".to_string())?;
        job.result
            .clone()
            .ok_or_else(|| "This job has no result yet".to_string())?
    };

    tokio::fs::write(&dest_path, &bytes)
        .await
        .map_err(|e| format!("Failed to save sticker: {}", e))?;
    info!("[save] wrote sticker for job {} to {}", job_id, dest_path);
    Ok(())
}

// ============ Style Commands ============

#[command]
async fn get_styles() -> Result<Vec<StylePreset>, String> {
    Ok(prompts::style_catalog().to_vec())
}

#[command]
async fn get_style(state: State<'_, AppState>) -> Result<StyleSelection, String> {
    Ok(state.style.lock().unwrap().clone())
}

#[command]
async fn set_style(state: State<'_, AppState>, style: StyleSelection) -> Result<(), String> {
    info!("[style] selected '{}'", style.style_id());
    *state.style.lock().unwrap() = style;
    Ok(())
}

#[command]
async fn get_style_fragment(style_id: String) -> Result<String, String> {
    prompts::get_fragment_text(&style_id)
}

#[command]
async fn save_style_fragment(
    state: State<'_, AppState>,
    style_id: String,
    text: String,
) -> Result<(), String> {
    prompts::save_fragment_text(&style_id, &text)?;
    prompts::invalidate_fragment(&style_id, &state.fragment_cache);
    info!("[style] fragment '{}' updated", style_id);
    Ok(())
}

// ============ Generation ============

/// Runs the whole batch: one concurrent generation call per job, all
/// outcomes merged back into the store as a single state transition.
#[command]
async fn generate_stickers(
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<Vec<JobView>, String> {
    let api_key = state
        .api_key
        .lock()
        .unwrap()
        .clone()
        .ok_or_else(|| "Please enter a valid Gemini API key first.".to_string())?;
    let style = state.style.lock().unwrap().clone();

    // Resolved once per run; the per-job variation is only the guidance
    // fragment, chosen from the annotation flag inside the dispatcher.
    let fragment = prompts::resolve_style_fragment(&style, &state.fragment_cache);

    // Client construction is the one failure point before per-job
    // isolation begins. No job status has changed yet, so the batch can
    // be rerun in full after this error.
    let client = GeminiClient::new(api_key)?;

    let payloads = {
        let mut store = state.store.lock().unwrap();
        store.begin_run()?;
        store.payloads()
    };

    info!(
        "[generate] dispatching {} job(s) with style '{}'",
        payloads.len(),
        style.style_id()
    );
    let outcomes = dispatcher::run_batch(&client, &fragment, payloads).await;

    let mut store = state.store.lock().unwrap();
    store.apply_outcomes(outcomes);
    let views = store.views();

    let completed = views
        .iter()
        .filter(|v| v.status == ProcessingStatus::Completed)
        .count();
    let failed = views
        .iter()
        .filter(|v| v.status == ProcessingStatus::Failed)
        .count();
    info!(
        "[generate] batch finished: {} completed, {} failed",
        completed, failed
    );
    let _ = app.emit(
        "generation-complete",
        json!({ "completed": completed, "failed": failed }),
    );

    Ok(views)
}

// ============ Theme Commands ============

#[command]
async fn get_dark_mode(state: State<'_, AppState>) -> Result<bool, String> {
    Ok(*state.dark_mode.lock().unwrap())
}

#[command]
async fn set_dark_mode(state: State<'_, AppState>, enabled: bool) -> Result<(), String> {
    *state.dark_mode.lock().unwrap() = enabled;
    Ok(())
}

// ============ Frontend Logging ============

#[command]
fn log_from_frontend(level: String, message: String) {
    match level.as_str() {
        "error" => error!("[Frontend] {}", message),
        "warn" => warn!("[Frontend] {}", message),
        _ => info!("[Frontend] {}", message),
    }
}

fn main() {
    tauri::Builder::default()
        .manage(AppState::default())
        .setup(|_app| {
            info!("=== Sticker Studio Starting ===");
            match paths::get_app_data_dir() {
                Ok(dir) => info!("[startup] App data directory: {:?}", dir),
                Err(e) => warn!("[startup] {}", e),
            }
            if let Err(e) = prompts::ensure_style_fragment_files() {
                warn!("[startup] Could not seed style fragments: {}", e);
            }
            Ok(())
        })
        .plugin(tauri_plugin_dialog::init())
        .plugin(
            tauri_plugin_log::Builder::new()
                .target(tauri_plugin_log::Target::new(
                    tauri_plugin_log::TargetKind::LogDir {
                        file_name: Some("sticker-studio.log".into()),
                    },
                ))
                .level(log::LevelFilter::Info)
                .build(),
        )
        .invoke_handler(tauri::generate_handler![
            set_api_key,
            has_api_key,
            get_upload_mode,
            set_upload_mode,
            add_jobs,
            add_jobs_from_paths,
            get_jobs,
            get_active_index,
            select_job,
            remove_active_job,
            set_annotation,
            clear_jobs,
            get_job_preview,
            save_result,
            get_styles,
            get_style,
            set_style,
            get_style_fragment,
            save_style_fragment,
            generate_stickers,
            get_dark_mode,
            set_dark_mode,
            log_from_frontend,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
