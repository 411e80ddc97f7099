//! MP3 stitching using FFmpeg.
//!
//! Decoding and concatenation are delegated to the external `ffmpeg` binary;
//! this module only writes segment payloads to disk in fragment order and
//! drives the concat demuxer.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn ffmpeg_command() -> Command {
    Command::new("ffmpeg")
}

fn ffprobe_command() -> Command {
    Command::new("ffprobe")
}

/// Concatenate encoded MP3 segment payloads into a single output file.
///
/// Segment order is preserved exactly.
pub fn stitch_mp3_segments(segments: &[Vec<u8>], output_path: &Path) -> Result<()> {
    if segments.is_empty() {
        anyhow::bail!("No audio segments provided");
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    if segments.len() == 1 {
        std::fs::write(output_path, &segments[0])?;
        return Ok(());
    }

    let temp_dir = TempDir::new()?;
    let mut segment_paths = Vec::with_capacity(segments.len());
    for (i, segment) in segments.iter().enumerate() {
        let path = temp_dir.path().join(format!("segment_{:04}.mp3", i));
        std::fs::write(&path, segment)
            .with_context(|| format!("Failed to write segment {}", i))?;
        segment_paths.push(path);
    }

    let list_file = temp_dir.path().join("concat_list.txt");
    let mut list_content = String::new();
    for path in &segment_paths {
        // Escape single quotes in path
        let path_str = path.to_string_lossy().replace('\'', "'\\''");
        list_content.push_str(&format!("file '{}'\n", path_str));
    }
    std::fs::write(&list_file, &list_content)?;

    let output = ffmpeg_command()
        .args(["-y", "-f", "concat", "-safe", "0", "-i"])
        .arg(&list_file)
        .args(["-c", "copy"])
        .arg(output_path)
        .output()
        .context("Failed to run ffmpeg concat")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("ffmpeg concat failed: {}", stderr);
    }

    Ok(())
}

/// Get duration of an audio file in milliseconds using ffprobe.
pub fn get_audio_duration_ms(audio_path: &Path) -> Result<u64> {
    let output = ffprobe_command()
        .args([
            "-v",
            "quiet",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(audio_path)
        .output()
        .context("Failed to run ffprobe")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("ffprobe failed: {}", stderr);
    }

    let duration_str = String::from_utf8_lossy(&output.stdout);
    let duration_secs: f64 = duration_str
        .trim()
        .parse()
        .context("Failed to parse duration")?;

    Ok((duration_secs * 1000.0) as u64)
}

/// Check if FFmpeg is available on PATH.
pub fn is_ffmpeg_available() -> bool {
    ffmpeg_command()
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Check if FFprobe is available on PATH.
pub fn is_ffprobe_available() -> bool {
    ffprobe_command()
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
