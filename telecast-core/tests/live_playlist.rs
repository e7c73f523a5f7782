use telecast_core::playlist::{media_sequence_at, render, WINDOW_AHEAD, WINDOW_BEHIND};
use telecast_core::program::{CompiledProgram, CompiledSource};

fn source(fingerprint: &str, path: &str) -> CompiledSource {
    CompiledSource {
        fingerprint: fingerprint.into(),
        original_path: path.into(),
    }
}

/// One source with segments 6.0, 6.0, 4.5 (loop of 16.5s).
fn single_source() -> CompiledProgram {
    CompiledProgram::new(
        vec![
            (0, 6.0, "channels/one/videos/aa/segment_00000.ts".into()),
            (0, 6.0, "channels/one/videos/aa/segment_00001.ts".into()),
            (0, 4.5, "channels/one/videos/aa/segment_00002.ts".into()),
        ],
        vec![source("aa", "/media/a.mp4")],
    )
}

/// Two sources with two 2.0s segments each (loop of 8s).
fn two_sources() -> CompiledProgram {
    CompiledProgram::new(
        vec![
            (0, 2.0, "channels/two/videos/aa/segment_00000.ts".into()),
            (0, 2.0, "channels/two/videos/aa/segment_00001.ts".into()),
            (1, 2.0, "channels/two/videos/bb/segment_00000.ts".into()),
            (1, 2.0, "channels/two/videos/bb/segment_00001.ts".into()),
        ],
        vec![source("aa", "/media/a.mp4"), source("bb", "/media/b.mp4")],
    )
}

fn header_value<'a>(manifest: &'a str, tag: &str) -> &'a str {
    manifest
        .lines()
        .find_map(|line| line.strip_prefix(tag))
        .unwrap_or_else(|| panic!("manifest missing {tag}"))
}

/// `(duration, url)` pairs in emission order.
fn body_pairs(manifest: &str) -> Vec<(f64, String)> {
    let mut pairs = Vec::new();
    let mut pending = None;
    for line in manifest.lines() {
        if let Some(value) = line.strip_prefix("#EXTINF:") {
            pending = Some(value.trim_end_matches(',').parse::<f64>().unwrap());
        } else if !line.starts_with('#') && !line.is_empty() {
            pairs.push((pending.take().unwrap(), line.to_string()));
        }
    }
    pairs
}

#[test]
fn empty_channel_renders_three_line_end_of_list() {
    let program = CompiledProgram::default();
    assert_eq!(
        render(&program, 0.0),
        "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-ENDLIST\n"
    );
}

#[test]
fn single_source_at_offset_zero() {
    let manifest = render(&single_source(), 0.0);
    assert_eq!(header_value(&manifest, "#EXT-X-MEDIA-SEQUENCE:"), "0");
    assert_eq!(header_value(&manifest, "#EXT-X-TARGETDURATION:"), "6");
    assert!(!manifest.contains("#EXT-X-ENDLIST"));
    assert!(!manifest.contains("#EXT-X-PLAYLIST-TYPE"));
    assert!(!manifest.contains("#EXT-X-DISCONTINUITY"));

    let pairs = body_pairs(&manifest);
    // Current index 0 with nothing behind: the window is the full look-ahead.
    assert_eq!(pairs.len(), WINDOW_AHEAD);
    assert_eq!(pairs[0].1, "channels/one/videos/aa/segment_00000.ts");
    assert!((pairs[0].0 - 6.0).abs() < 1e-9);
    assert!((pairs[2].0 - 4.5).abs() < 1e-9);
    // Wraps seamlessly back to the first segment.
    assert_eq!(pairs[3].1, "channels/one/videos/aa/segment_00000.ts");
    assert!(manifest.contains("#EXTINF:6.000000,\n"));
    assert!(manifest.contains("#EXTINF:4.500000,\n"));
}

#[test]
fn exact_double_loop_bumps_sequence_by_two_programs() {
    let program = single_source();
    let at_zero = render(&program, 0.0);
    let at_two_loops = render(&program, 33.0);
    assert_eq!(header_value(&at_two_loops, "#EXT-X-MEDIA-SEQUENCE:"), "6");
    // Same phase, same window: bodies are identical.
    assert_eq!(body_pairs(&at_zero), body_pairs(&at_two_loops));
}

#[test]
fn discontinuities_separate_sources_including_the_wrap() {
    let manifest = render(&two_sources(), 3.0);
    let pairs = body_pairs(&manifest);
    // Phase 3.0 plays the second segment of the first source; the window
    // reaches back to index 0 and far ahead across the wrap.
    assert_eq!(pairs[0].1, "channels/two/videos/aa/segment_00000.ts");
    assert_eq!(pairs[1].1, "channels/two/videos/aa/segment_00001.ts");
    assert_eq!(pairs[2].1, "channels/two/videos/bb/segment_00000.ts");
    assert_eq!(pairs[3].1, "channels/two/videos/bb/segment_00001.ts");
    assert_eq!(pairs[4].1, "channels/two/videos/aa/segment_00000.ts");

    // Markers sit exactly at source boundaries, nowhere else.
    let mut previous_url: Option<&str> = None;
    let mut marker_pending = false;
    for line in manifest.lines().skip(4) {
        if line == "#EXT-X-DISCONTINUITY" {
            marker_pending = true;
        } else if !line.starts_with('#') && !line.is_empty() {
            if let Some(previous) = previous_url {
                let changed = previous.split('/').nth(3) != line.split('/').nth(3);
                assert_eq!(
                    marker_pending, changed,
                    "marker mismatch between {previous} and {line}"
                );
            }
            previous_url = Some(line);
            marker_pending = false;
        }
    }
}

#[test]
fn window_size_matches_current_index() {
    let program = two_sources();
    // Phase 3.0: the playing segment is index 1, so one segment sits behind.
    let pairs = body_pairs(&render(&program, 3.0));
    assert_eq!(pairs.len(), WINDOW_AHEAD + 1);
    // Phase 0: nothing behind.
    let pairs = body_pairs(&render(&program, 0.0));
    assert_eq!(pairs.len(), WINDOW_AHEAD);
    // The window never exceeds behind + ahead.
    for offset in [0.0, 1.0, 5.0, 7.9, 8.0, 100.0, 1234.5] {
        let pairs = body_pairs(&render(&program, offset));
        assert!(pairs.len() <= WINDOW_BEHIND + WINDOW_AHEAD);
    }
}

#[test]
fn media_sequence_is_monotonic_and_loop_aware() {
    let program = single_source();
    let total = program.total_seconds;
    let mut previous = 0u64;
    let mut offset = 0.0;
    while offset < total * 5.0 {
        let sequence = media_sequence_at(&program, offset);
        assert!(
            sequence >= previous,
            "sequence regressed at offset {offset}: {sequence} < {previous}"
        );
        previous = sequence;
        offset += 0.25;
    }

    // Exactly one loop apart differs by exactly the program length.
    for offset in [0.0, 2.5, 7.0, 16.0] {
        let before = media_sequence_at(&program, offset);
        let after = media_sequence_at(&program, offset + total);
        assert_eq!(after - before, program.len() as u64);
    }
}

#[test]
fn target_duration_covers_every_emitted_segment() {
    for (program, offset) in [
        (single_source(), 0.0),
        (single_source(), 14.0),
        (two_sources(), 3.0),
        (two_sources(), 7.5),
    ] {
        let manifest = render(&program, offset);
        let target: f64 = header_value(&manifest, "#EXT-X-TARGETDURATION:")
            .parse()
            .unwrap();
        for (duration, url) in body_pairs(&manifest) {
            assert!(
                target >= duration.ceil(),
                "target {target} below segment {url} ({duration})"
            );
        }
    }
}

#[test]
fn target_duration_has_a_floor_of_two() {
    let program = CompiledProgram::new(
        vec![
            (0, 0.8, "channels/x/videos/aa/segment_00000.ts".into()),
            (0, 0.9, "channels/x/videos/aa/segment_00001.ts".into()),
        ],
        vec![source("aa", "/media/a.mp4")],
    );
    let manifest = render(&program, 0.0);
    assert_eq!(header_value(&manifest, "#EXT-X-TARGETDURATION:"), "2");
}

#[test]
fn manifest_round_trips_through_a_parser() {
    let program = two_sources();
    let manifest = render(&program, 3.0);
    let pairs = body_pairs(&manifest);

    // Re-derive the expected window directly from the program.
    let count = program.len();
    let expected: Vec<(f64, String)> = (0..pairs.len())
        .map(|position| {
            let segment = &program.segments[position % count];
            (segment.duration, segment.url.clone())
        })
        .collect();
    assert_eq!(pairs, expected);

    // Cumulative time re-derived from parsed durations matches the program.
    let mut cumulative = 0.0;
    for (position, (duration, _)) in pairs.iter().enumerate().take(count) {
        assert!((program.segments[position].cumulative - cumulative).abs() < 1e-9);
        cumulative += duration;
    }
}

#[test]
fn sequence_climbs_within_a_long_program() {
    // More segments than the behind-window so the start tracks the index.
    let segments: Vec<(usize, f64, String)> = (0..50)
        .map(|position| {
            (
                position / 5,
                4.0,
                format!("channels/long/videos/s{}/segment_{position:05}.ts", position / 5),
            )
        })
        .collect();
    let sources = (0..10)
        .map(|index| source(&format!("s{index}"), &format!("/media/{index}.mp4")))
        .collect();
    let program = CompiledProgram::new(segments, sources);

    let mut previous = 0u64;
    let mut offset = 0.0;
    while offset < program.total_seconds * 2.5 {
        let sequence = media_sequence_at(&program, offset);
        assert!(sequence >= previous, "regression at offset {offset}");
        previous = sequence;
        offset += 1.0;
    }
    // Deep into the loop the window sheds its oldest entries.
    let late = media_sequence_at(&program, 160.0);
    assert_eq!(late, (160.0 / 4.0) as u64 - WINDOW_BEHIND as u64);
}
