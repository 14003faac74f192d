//! Disk-streamed sources against their in-memory equivalents.

use hound::{SampleFormat, WavSpec, WavWriter};
use mezcla_engine::{
    EngineConfig, LimiterConfig, PlaybackState, SinkCollector, SinkOutput, Source, System,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const RATE: u32 = 44100;
const PERIOD: usize = 1024;

/// Deterministic, aperiodic fixture signal with peak below 1.0 so the
/// in-memory load path does not normalize.
fn fixture_sample(frame: usize) -> f32 {
    (frame % 997) as f32 / 1000.0 - 0.498
}

fn write_fixture(dir: &TempDir, frames: usize) -> PathBuf {
    let path = dir.path().join("fixture.wav");
    let spec = WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(&path, spec).unwrap();
    for frame in 0..frames {
        writer.write_sample(fixture_sample(frame)).unwrap();
    }
    writer.finalize().unwrap();
    path
}

fn test_system() -> (System, SinkCollector) {
    let sink = SinkOutput::new();
    let collector = sink.collector();
    let config = EngineConfig {
        sample_rate: RATE,
        period: PERIOD,
        queue_blocks: 8,
        limiter: LimiterConfig {
            enabled: false,
            threshold: 1.0,
        },
        ..EngineConfig::default()
    };
    (System::new(config, Box::new(sink)), collector)
}

fn wait_for_blocks(collector: &SinkCollector, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while collector.block_count() < count {
        assert!(Instant::now() < deadline, "timed out waiting for blocks");
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Play `path` through a fresh system, streamed or fully loaded, and
/// return the first `blocks` delivered blocks. `setup` runs after `play`
/// (which rewinds to the loop start) and before the workers spawn, so
/// seeks survive and the output stays deterministic.
fn play_file(path: &Path, stream: bool, blocks: usize, setup: impl Fn(&Arc<Source>)) -> Vec<Vec<f32>> {
    let (mut system, collector) = test_system();
    let source = system.load_audio(path, "fixture", stream).unwrap();
    let group = system.create_group("");
    system.add_to_group(&group, Arc::clone(&source)).unwrap();
    let bus = system.create_bus("");
    system.add_to_bus(&bus, group);
    system.add_bus(bus);

    source.play(0.0);
    setup(&source);
    system.start().unwrap();
    wait_for_blocks(&collector, blocks);
    system.close();
    collector.blocks()
}

#[test]
fn streaming_matches_in_memory_end_to_end() {
    let dir = TempDir::new().unwrap();
    let frames = 13230; // 0.3 s: 12 full blocks and a partial 13th
    let path = write_fixture(&dir, frames);
    let blocks = frames / PERIOD + 2;

    let memory = play_file(&path, false, blocks, |_| {});
    let streamed = play_file(&path, true, blocks, |_| {});

    for (b, (m, s)) in memory.iter().zip(streamed.iter()).take(blocks).enumerate() {
        assert_eq!(m, s, "block {b} differs between memory and stream");
    }
    // And both match the file itself.
    for frame in 0..frames {
        let block = frame / PERIOD;
        let offset = frame % PERIOD;
        assert_eq!(memory[block][2 * offset], fixture_sample(frame), "frame {frame}");
        assert_eq!(memory[block][2 * offset + 1], fixture_sample(frame));
    }
}

#[test]
fn streaming_source_stops_at_end_of_file() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, 3000);
    let (mut system, collector) = test_system();
    let source = system.load_audio(&path, "short", true).unwrap();
    assert!(source.is_streaming());

    let group = system.create_group("");
    system.add_to_group(&group, Arc::clone(&source)).unwrap();
    let bus = system.create_bus("");
    system.add_to_bus(&bus, group);
    system.add_bus(bus);

    source.play(0.0);
    system.start().unwrap();
    wait_for_blocks(&collector, 5);
    let deadline = Instant::now() + Duration::from_secs(5);
    while source.state() != PlaybackState::Stopped {
        assert!(Instant::now() < deadline, "streaming source never stopped");
        std::thread::sleep(Duration::from_millis(1));
    }
    system.close();

    // 3000 frames end inside block 2; block 3 on is silence.
    let blocks = collector.blocks();
    assert!(blocks[3].iter().all(|&s| s == 0.0));
}

#[test]
fn streaming_seek_repositions_playback() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, 40000);

    let blocks = play_file(&path, true, 2, |source| {
        source.seek(20000);
    });

    for n in 0..64 {
        assert_eq!(
            blocks[0][2 * n],
            fixture_sample(20000 + n),
            "frame {n} after streaming seek"
        );
    }
}

#[test]
fn streaming_loop_wraps_to_the_start() {
    let dir = TempDir::new().unwrap();
    let frames = 2500; // wraps inside block 2
    let path = write_fixture(&dir, frames);

    let blocks = play_file(&path, true, 4, |source| {
        source.set_loop(true, 0, None);
    });

    for frame in 0..(3 * PERIOD) {
        let expected = fixture_sample(frame % frames);
        let block = frame / PERIOD;
        let offset = frame % PERIOD;
        assert_eq!(
            blocks[block][2 * offset], expected,
            "frame {frame} across the loop seam"
        );
    }
}

#[test]
fn streaming_refuses_rate_mismatch() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wrong_rate.wav");
    let spec = WavSpec {
        channels: 1,
        sample_rate: 48000,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(&path, spec).unwrap();
    for _ in 0..1000 {
        writer.write_sample(0.1f32).unwrap();
    }
    writer.finalize().unwrap();

    let (system, _collector) = test_system();
    assert!(system.load_audio(&path, "", true).is_err());
    assert!(system.load_audio(&path, "", false).is_err());
}
