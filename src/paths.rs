//! Path utilities and file system helpers

use std::path::PathBuf;

/// Gets the application data directory
pub fn get_app_data_dir() -> Result<PathBuf, String> {
    dirs::data_dir()
        .map(|p| p.join("com.sticker-studio.app"))
        .ok_or_else(|| "Could not find app data directory".to_string())
}

/// Gets the directory holding the per-style prompt fragment files
pub fn get_styles_dir() -> Result<PathBuf, String> {
    get_app_data_dir().map(|p| p.join("prompts").join("styles"))
}

/// Gets the fragment file path for a style id
pub fn get_style_fragment_path(style_id: &str) -> Result<PathBuf, String> {
    get_styles_dir().map(|p| p.join(format!("{}.md", style_id)))
}
