//! Media file naming and type inference.

use std::borrow::Cow;
use std::path::Path;

use reqwest::Url;

/// Extensions accepted as-is in a display name.
const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".webm", ".mov", ".avi", ".mkv"];

const DEFAULT_EXTENSION: &str = ".mp4";
const DEFAULT_DISPLAY_NAME: &str = "video";

/// Pick a file suffix from a response content type. Only `video/*` types
/// are sniffed.
pub fn extension_for_content_type(content_type: Option<&str>) -> &'static str {
    let Some(ct) = content_type.filter(|ct| ct.trim_start().starts_with("video/")) else {
        return DEFAULT_EXTENSION;
    };
    if ct.contains("webm") {
        ".webm"
    } else if ct.contains("quicktime") {
        ".mov"
    } else {
        DEFAULT_EXTENSION
    }
}

/// Lowercased extension (with leading dot) of a client-supplied filename.
pub fn extension_from_filename(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
}

/// Display name for a downloaded URL: the decoded last path segment, with
/// `extension` appended unless it already ends in a known video extension.
pub fn display_name_from_url(url: &Url, extension: &str) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::decode(s).unwrap_or(Cow::Borrowed(s)).into_owned())
        .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string());

    if has_video_extension(&segment) {
        segment
    } else {
        format!("{}{}", segment, extension)
    }
}

fn has_video_extension(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    VIDEO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// MIME type to submit: a `video/*` content type wins, else map the extension.
pub fn infer_mime_type(content_type: Option<&str>, extension: &str) -> String {
    if let Some(ct) = content_type {
        let essence = ct.split(';').next().unwrap_or(ct).trim();
        if essence.starts_with("video/") {
            return essence.to_string();
        }
    }

    match extension.to_ascii_lowercase().as_str() {
        ".webm" => "video/webm",
        ".mov" => "video/quicktime",
        ".avi" => "video/x-msvideo",
        ".mkv" => "video/x-matroska",
        ".mp4" | ".m4v" => "video/mp4",
        _ => "application/octet-stream",
    }
    .to_string()
}
