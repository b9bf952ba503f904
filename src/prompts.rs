//! Prompt templates and instruction assembly for sticker generation
//!
//! The final instruction sent to the generation service is three parts in
//! fixed order: the base die-cut contract, a subject-guidance fragment
//! (manual marker vs. automatic detection), and a style fragment. Preset
//! style fragments live as editable Markdown files under the app data
//! directory and are seeded from the embedded defaults at startup.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use log::{info, warn};

use crate::models::{StyleGroup, StylePreset, StyleSelection};
use crate::paths::{get_style_fragment_path, get_styles_dir};

/// Base instruction describing the die-cut sticker output contract
pub const BASE_INSTRUCTION: &str = "Generate a high-quality die-cut sticker based on this image. \
The output must be a single sticker on a transparent or solid white background. \
Add a thick white border around the subject (die-cut style).";

/// Guidance used when the user drew a marker on the image
pub const MANUAL_GUIDANCE: &str = "IMPORTANT: A crude red line or circle has been drawn around \
the specific object to extract. Use this red marking to identify the subject, but DO NOT \
include the red line in the final generated sticker. The final sticker should look clean.";

/// Guidance used when no marker was drawn
pub const AUTO_GUIDANCE: &str = "Automatically identify the main salient subject of the image \
and isolate it.";

/// Substituted when a preset fragment file cannot be read
pub const FALLBACK_STYLE_FRAGMENT: &str = "Render the sticker in a clean, appealing style.";

static STYLE_CATALOG: &[StylePreset] = &[
    StylePreset {
        id: "faithful",
        name: "Faithful",
        group: StyleGroup::Faithful,
        preview_color: "#64748b",
    },
    StylePreset {
        id: "pixar",
        name: "Pixar 3D",
        group: StyleGroup::Artistic,
        preview_color: "#3b82f6",
    },
    StylePreset {
        id: "pixel",
        name: "Pixel Art",
        group: StyleGroup::Artistic,
        preview_color: "#a855f7",
    },
    StylePreset {
        id: "watercolor",
        name: "Watercolor",
        group: StyleGroup::Artistic,
        preview_color: "#f472b6",
    },
    StylePreset {
        id: "ghibli",
        name: "Ghibli",
        group: StyleGroup::Artistic,
        preview_color: "#22c55e",
    },
    StylePreset {
        id: "christmas",
        name: "Christmas",
        group: StyleGroup::Thematic,
        preview_color: "#dc2626",
    },
    StylePreset {
        id: "lunar_new_year",
        name: "Lunar New Year",
        group: StyleGroup::Thematic,
        preview_color: "#eab308",
    },
    StylePreset {
        id: "tropical",
        name: "Tropical",
        group: StyleGroup::Thematic,
        preview_color: "#fb923c",
    },
    StylePreset {
        id: "medieval",
        name: "Medieval",
        group: StyleGroup::Thematic,
        preview_color: "#57534e",
    },
];

/// All selectable presets, in display order
pub fn style_catalog() -> &'static [StylePreset] {
    STYLE_CATALOG
}

/// Embedded default fragment text for a preset id
fn default_fragment(style_id: &str) -> Option<&'static str> {
    let text = match style_id {
        "faithful" => {
            "Keep the subject exactly as it appears in the photo. Preserve its colors, \
             proportions and fine detail; only clean up and remove the background."
        }
        "pixar" => {
            "Re-render the subject as a Pixar-style 3D character: soft rounded shapes, glossy \
             materials, warm cinematic lighting and big expressive eyes."
        }
        "pixel" => {
            "Redraw the subject as retro pixel art with a limited 16-color palette, chunky \
             pixels and crisp aliased edges."
        }
        "watercolor" => {
            "Repaint the subject as a loose watercolor illustration with soft washes, visible \
             paper grain and gentle color bleed at the edges."
        }
        "ghibli" => {
            "Redraw the subject in a hand-painted Ghibli-inspired anime style with soft gouache \
             shading and warm, nostalgic colors."
        }
        "christmas" => {
            "Give the subject a festive Christmas makeover: add a Santa hat or cozy scarf, \
             snowflakes, and a holiday palette of red, green and gold."
        }
        "lunar_new_year" => {
            "Dress the subject for Lunar New Year with red and gold accents, paper lanterns \
             and festive confetti."
        }
        "tropical" => {
            "Place the subject in a tropical summer setting with palm leaves, hibiscus flowers \
             and bright sunny colors."
        }
        "medieval" => {
            "Reimagine the subject as a medieval fantasy character with period clothing, \
             parchment tones and heraldic ornament."
        }
        _ => return None,
    };
    Some(text)
}

/// Seeds missing fragment files from the embedded defaults.
/// Returns how many files were written.
pub fn ensure_style_fragment_files() -> Result<usize, String> {
    let dir = get_styles_dir()?;
    std::fs::create_dir_all(&dir)
        .map_err(|e| format!("Failed to create styles directory: {}", e))?;

    let mut written = 0;
    for preset in style_catalog() {
        let path = dir.join(format!("{}.md", preset.id));
        if path.exists() {
            continue;
        }
        if let Some(text) = default_fragment(preset.id) {
            std::fs::write(&path, text)
                .map_err(|e| format!("Failed to seed style fragment {}: {}", preset.id, e))?;
            written += 1;
        }
    }
    if written > 0 {
        info!("[prompts] seeded {} style fragment file(s)", written);
    }
    Ok(written)
}

/// Reads one fragment file. `None` means "not resolvable" (missing,
/// unreadable, or blank), which the caller turns into the fallback.
fn read_fragment_file(dir: &Path, style_id: &str) -> Option<String> {
    let path = dir.join(format!("{}.md", style_id));
    let text = std::fs::read_to_string(&path).ok()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

/// Fragment resolution for presets: cached per id for the process lifetime.
/// Only successful reads are cached, so a missing file can be fixed and
/// picked up on the next run.
fn resolve_preset_fragment(
    dir: &Path,
    style_id: &str,
    cache: &Mutex<HashMap<String, String>>,
) -> String {
    if let Some(cached) = cache.lock().unwrap().get(style_id) {
        return cached.clone();
    }

    match read_fragment_file(dir, style_id) {
        Some(text) => {
            cache
                .lock()
                .unwrap()
                .insert(style_id.to_string(), text.clone());
            text
        }
        None => {
            warn!(
                "[prompts] style fragment '{}' unresolved, using fallback",
                style_id
            );
            FALLBACK_STYLE_FRAGMENT.to_string()
        }
    }
}

/// Resolves the style fragment for the active selection.
/// Custom text passes through verbatim (empty is valid); presets resolve
/// from their fragment file with the fallback substituted on failure.
pub fn resolve_style_fragment(
    style: &StyleSelection,
    cache: &Mutex<HashMap<String, String>>,
) -> String {
    match style {
        StyleSelection::Custom { text } => text.clone(),
        other => match get_styles_dir() {
            Ok(dir) => resolve_preset_fragment(&dir, other.style_id(), cache),
            Err(e) => {
                warn!("[prompts] styles directory unavailable: {}", e);
                FALLBACK_STYLE_FRAGMENT.to_string()
            }
        },
    }
}

/// Drops a cached fragment so the next resolution re-reads its file
pub fn invalidate_fragment(style_id: &str, cache: &Mutex<HashMap<String, String>>) {
    cache.lock().unwrap().remove(style_id);
}

/// Reads the current fragment text for an id, falling back to the embedded
/// default when the file is unreadable
pub fn get_fragment_text(style_id: &str) -> Result<String, String> {
    let dir = get_styles_dir()?;
    Ok(read_fragment_file(&dir, style_id)
        .or_else(|| default_fragment(style_id).map(str::to_string))
        .unwrap_or_default())
}

/// Overwrites a fragment file
pub fn save_fragment_text(style_id: &str, text: &str) -> Result<(), String> {
    let path = get_style_fragment_path(style_id)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create directory: {}", e))?;
    }
    std::fs::write(&path, text)
        .map_err(|e| format!("Failed to save style fragment: {}", e))
}

/// Composes the final instruction: base contract, then subject guidance,
/// then the style fragment. An empty fragment contributes nothing.
pub fn assemble_instruction(style_fragment: &str, has_manual_annotation: bool) -> String {
    let guidance = if has_manual_annotation {
        MANUAL_GUIDANCE
    } else {
        AUTO_GUIDANCE
    };

    let mut instruction = format!("{} {}", BASE_INSTRUCTION, guidance);
    if !style_fragment.is_empty() {
        instruction.push(' ');
        instruction.push_str(style_fragment);
    }
    instruction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CUSTOM_STYLE_ID;
    use std::path::PathBuf;

    fn temp_styles_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sticker-studio-test-{}", tag));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn manual_guidance_only_with_annotation() {
        let with = assemble_instruction("", true);
        assert!(with.contains(MANUAL_GUIDANCE));
        assert!(!with.contains(AUTO_GUIDANCE));

        let without = assemble_instruction("", false);
        assert!(without.contains(AUTO_GUIDANCE));
        assert!(!without.contains(MANUAL_GUIDANCE));
    }

    #[test]
    fn instruction_order_is_base_guidance_style() {
        let text = assemble_instruction("Paint it blue.", false);
        let base = text.find(BASE_INSTRUCTION).unwrap();
        let guidance = text.find(AUTO_GUIDANCE).unwrap();
        let style = text.find("Paint it blue.").unwrap();
        assert!(base < guidance && guidance < style);
    }

    #[test]
    fn empty_custom_fragment_is_valid() {
        let cache = Mutex::new(HashMap::new());
        let style = StyleSelection::Custom { text: String::new() };
        let fragment = resolve_style_fragment(&style, &cache);
        assert_eq!(fragment, "");

        let instruction = assemble_instruction(&fragment, false);
        assert!(!instruction.ends_with(' '));
    }

    #[test]
    fn custom_text_passes_through_verbatim() {
        let cache = Mutex::new(HashMap::new());
        let style = StyleSelection::Custom {
            text: "  exactly this  ".into(),
        };
        assert_eq!(resolve_style_fragment(&style, &cache), "  exactly this  ");
        assert!(cache.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_fragment_falls_back_and_is_not_cached() {
        let dir = temp_styles_dir("missing");
        let cache = Mutex::new(HashMap::new());

        let first = resolve_preset_fragment(&dir, "pixar", &cache);
        assert_eq!(first, FALLBACK_STYLE_FRAGMENT);
        assert!(cache.lock().unwrap().is_empty());

        // Drop the file in place; the next resolution picks it up.
        std::fs::write(dir.join("pixar.md"), "Soft 3D look.").unwrap();
        let second = resolve_preset_fragment(&dir, "pixar", &cache);
        assert_eq!(second, "Soft 3D look.");
    }

    #[test]
    fn resolved_fragment_is_cached_for_process_lifetime() {
        let dir = temp_styles_dir("cached");
        std::fs::write(dir.join("ghibli.md"), "Hand-painted anime.").unwrap();
        let cache = Mutex::new(HashMap::new());

        assert_eq!(
            resolve_preset_fragment(&dir, "ghibli", &cache),
            "Hand-painted anime."
        );

        // File changes after resolution are not observed again.
        std::fs::write(dir.join("ghibli.md"), "Something else.").unwrap();
        assert_eq!(
            resolve_preset_fragment(&dir, "ghibli", &cache),
            "Hand-painted anime."
        );
    }

    #[test]
    fn blank_fragment_file_counts_as_unresolved() {
        let dir = temp_styles_dir("blank");
        std::fs::write(dir.join("pixel.md"), "   \n").unwrap();
        let cache = Mutex::new(HashMap::new());
        assert_eq!(
            resolve_preset_fragment(&dir, "pixel", &cache),
            FALLBACK_STYLE_FRAGMENT
        );
    }

    #[test]
    fn every_preset_has_a_default_fragment() {
        for preset in style_catalog() {
            assert!(default_fragment(preset.id).is_some(), "{}", preset.id);
            assert_ne!(preset.id, CUSTOM_STYLE_ID);
        }
        assert!(default_fragment(CUSTOM_STYLE_ID).is_none());
    }

    #[test]
    fn catalog_ids_are_collision_free() {
        let mut seen = std::collections::HashSet::new();
        for preset in style_catalog() {
            assert!(seen.insert(preset.id), "duplicate id {}", preset.id);
        }
    }
}
