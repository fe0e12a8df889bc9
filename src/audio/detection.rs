use std::path::Path;

/// Extensions accepted as encoder input (compared lowercase)
pub const ACCEPTED_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "aiff", "aif", "m4a", "flac", "ogg", "wma", "aac", "alac",
];

/// Check if a file is an audio file based on its extension
pub fn is_audio_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        ACCEPTED_EXTENSIONS.contains(&ext.as_str())
    } else {
        false
    }
}
