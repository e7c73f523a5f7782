use std::fmt::Write;

use crate::program::CompiledProgram;

/// Segments kept behind the current one so a late-joining player can still
/// fetch what it buffered before the last refresh.
pub const WINDOW_BEHIND: usize = 30;
/// Segments offered ahead of the current one; at the default segment length
/// this is a several-hour cushion past any reasonable player buffer.
pub const WINDOW_AHEAD: usize = 2000;

const EMPTY_MANIFEST: &str = "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-ENDLIST\n";

/// Render the live manifest for a channel at the given offset since its
/// epoch. Deterministic and filesystem-free: program position is a pure
/// function of the offset, so every concurrent reader at one instant sees
/// identical bytes.
pub fn render(program: &CompiledProgram, offset_seconds: f64) -> String {
    if program.is_empty() || program.total_seconds <= 0.0 {
        return EMPTY_MANIFEST.to_string();
    }

    let offset = offset_seconds.max(0.0);
    let total = program.total_seconds;
    let count = program.len();
    let loop_count = (offset / total).floor() as u64;
    let mut phase = offset - loop_count as f64 * total;
    if phase >= total {
        phase = 0.0;
    }

    let current = current_index(program, phase);
    let start = current.saturating_sub(WINDOW_BEHIND);
    // Media sequence climbs forever: L per completed loop plus the window
    // start inside the current loop. Players rely on it never decreasing
    // across refreshes or loop wraps.
    let media_sequence = loop_count * count as u64 + start as u64;

    let mut body = String::new();
    let mut max_duration = 0.0f64;
    let mut previous_video: Option<usize> = None;
    for position in start..current + WINDOW_AHEAD {
        let segment = &program.segments[position % count];
        if let Some(previous) = previous_video {
            if previous != segment.video_index {
                body.push_str("#EXT-X-DISCONTINUITY\n");
            }
        }
        previous_video = Some(segment.video_index);
        if segment.duration > max_duration {
            max_duration = segment.duration;
        }
        let _ = writeln!(body, "#EXTINF:{:.6},", segment.duration);
        body.push_str(&segment.url);
        body.push('\n');
    }

    let target_duration = max_duration.max(2.0).ceil() as u64;
    // No ENDLIST and no playlist-type: their absence is what tells players
    // this is an open-ended live stream.
    format!(
        "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:{target_duration}\n#EXT-X-MEDIA-SEQUENCE:{media_sequence}\n{body}"
    )
}

/// The media sequence the manifest at `offset_seconds` would carry.
pub fn media_sequence_at(program: &CompiledProgram, offset_seconds: f64) -> u64 {
    if program.is_empty() || program.total_seconds <= 0.0 {
        return 0;
    }
    let offset = offset_seconds.max(0.0);
    let loop_count = (offset / program.total_seconds).floor() as u64;
    let phase = offset - loop_count as f64 * program.total_seconds;
    let start = current_index(program, phase).saturating_sub(WINDOW_BEHIND);
    loop_count * program.len() as u64 + start as u64
}

/// The segment whose interval contains the phase; index 0 when floating-point
/// drift pushes the phase past every interval.
fn current_index(program: &CompiledProgram, phase: f64) -> usize {
    program
        .segments
        .iter()
        .position(|segment| segment.cumulative + segment.duration > phase)
        .unwrap_or(0)
}
