//! Local File Naming
//!
//! Deterministic local names for downloaded videos and validation of names
//! supplied by callers.

use crate::core::{CoreError, CoreResult};

/// Longest sanitized display-name prefix kept in a local name
pub const MAX_NAME_PREFIX: usize = 80;

/// Derive the local file name for a remote video
///
/// Keeps word characters, whitespace and hyphens, lower-cases, collapses
/// whitespace/hyphen runs to one underscore, truncates to
/// [`MAX_NAME_PREFIX`] characters, then appends `_` and the remote id up to
/// its first hyphen: `"My Clip!", "3f2a-..."` → `my_clip_3f2a.mp4`.
pub fn sanitize_filename(display_name: &str, remote_id: &str) -> String {
    let kept: String = display_name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    let lowered = kept.trim().to_lowercase();

    let mut name = String::with_capacity(lowered.len());
    let mut in_separator_run = false;
    for c in lowered.chars() {
        if c == '-' || c.is_whitespace() {
            if !in_separator_run {
                name.push('_');
                in_separator_run = true;
            }
        } else {
            name.push(c);
            in_separator_run = false;
        }
    }

    let prefix: String = name.chars().take(MAX_NAME_PREFIX).collect();
    let id_prefix = remote_id.split('-').next().unwrap_or(remote_id);

    format!("{}_{}.mp4", prefix, id_prefix)
}

/// Reject names that could escape their directory
pub(crate) fn validate_file_component(kind: &str, name: &str) -> CoreResult<()> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(format!("{} must not be empty", kind)));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") || name.contains('\0') {
        return Err(CoreError::Validation(format!(
            "Invalid {}: {}",
            kind.to_lowercase(),
            name
        )));
    }
    Ok(())
}
