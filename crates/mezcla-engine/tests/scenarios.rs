//! End-to-end scenarios: a full system over an in-memory sink, driven by
//! the real mixer and output pump workers.

use mezcla_engine::{
    EngineConfig, EqFilter, FilterKind, LimiterConfig, PlaybackState, SinkCollector, SinkOutput,
    Source, System,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

const RATE: u32 = 44100;
const PERIOD: usize = 1024;

fn test_system(limiter: LimiterConfig) -> (System, SinkCollector) {
    let sink = SinkOutput::new();
    let collector = sink.collector();
    let config = EngineConfig {
        sample_rate: RATE,
        period: PERIOD,
        queue_blocks: 8,
        limiter,
        ..EngineConfig::default()
    };
    (System::new(config, Box::new(sink)), collector)
}

fn limiter_off() -> LimiterConfig {
    LimiterConfig {
        enabled: false,
        threshold: 1.0,
    }
}

fn wait_for_blocks(collector: &SinkCollector, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while collector.block_count() < count {
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {count} blocks (have {})",
            collector.block_count()
        );
        std::thread::sleep(Duration::from_millis(1));
    }
}

fn block_peak(block: &[f32]) -> f32 {
    block.iter().fold(0.0f32, |p, s| p.max(s.abs()))
}

/// Route one source through a fresh group and bus into the system.
fn route_single(system: &System, source: &Arc<Source>) {
    let group = system.create_group("");
    system.add_to_group(&group, Arc::clone(source)).unwrap();
    let bus = system.create_bus("");
    system.add_to_bus(&bus, group);
    system.add_bus(bus);
}

#[test]
fn s1_empty_system_emits_silent_blocks() {
    let (mut system, collector) = test_system(limiter_off());
    system.start().unwrap();
    wait_for_blocks(&collector, 3);
    system.close();

    let blocks = collector.blocks();
    assert!(blocks.len() >= 3);
    for block in &blocks {
        assert_eq!(block.len(), PERIOD * 2, "block shape");
        assert!(block.iter().all(|&s| s == 0.0));
    }
    let metrics = system.metrics();
    assert_eq!(metrics.peak, [0.0; 2]);
    assert_eq!(metrics.rms, [0.0; 2]);
    assert_eq!(metrics.clip_count, 0);
}

#[test]
fn s2_sine_plays_through_and_stops() {
    let (mut system, collector) = test_system(limiter_off());
    let source = Arc::new(Source::sine(441.0, 1.0, RATE, 0.5));
    route_single(&system, &source);

    source.play(0.0);
    system.start().unwrap();

    // 44100 frames = 43 full blocks plus 68 frames of block 43.
    wait_for_blocks(&collector, 45);
    let deadline = Instant::now() + Duration::from_secs(5);
    while source.state() != PlaybackState::Stopped {
        assert!(Instant::now() < deadline, "source never stopped");
        std::thread::sleep(Duration::from_millis(1));
    }
    system.close();

    let blocks = collector.blocks();
    for (i, block) in blocks.iter().take(44).enumerate() {
        let peak = block_peak(block);
        assert!(
            (peak - 0.5).abs() < 1e-3,
            "block {i} peak {peak}, expected ~0.5"
        );
    }
    assert_eq!(block_peak(&blocks[44]), 0.0, "silence after the source ends");
}

#[test]
fn s3_fade_in_ramps_block_peaks() {
    let (mut system, collector) = test_system(limiter_off());
    let source = Arc::new(Source::sine(441.0, 1.0, RATE, 0.5));
    route_single(&system, &source);

    source.play(0.1); // 4410-sample ramp
    system.start().unwrap();
    wait_for_blocks(&collector, 8);
    system.close();

    let blocks = collector.blocks();
    let peaks: Vec<f32> = blocks.iter().take(8).map(|b| block_peak(b)).collect();

    assert!(peaks[0] < 1e-6, "first block starts at the ramp origin");
    for w in peaks.windows(2).take(5) {
        assert!(w[1] >= w[0] - 1e-6, "peaks rise through the fade: {peaks:?}");
    }
    // Block 5 starts past frame 4410: the ramp is done.
    assert!((peaks[5] - 0.5).abs() < 1e-3, "full level after the fade");
}

#[test]
fn s4_mute_and_solo_select_buses() {
    // Bus A: 441 Hz at 0.4. Bus B: 882 Hz at 0.2. Both loop forever.
    let build = |mute_a: bool, solo_a: bool, solo_b: bool| {
        let (mut system, collector) = test_system(limiter_off());
        for (freq, amp, mute, solo) in [
            (441.0, 0.4, mute_a, solo_a),
            (882.0, 0.2, false, solo_b),
        ] {
            let source = Arc::new(Source::sine(freq, 1.0, RATE, amp));
            source.set_loop(true, 0, None);
            source.play(0.0);
            let group = system.create_group("");
            system.add_to_group(&group, source).unwrap();
            let bus = system.create_bus("");
            bus.set_mute(mute);
            bus.set_solo(solo);
            system.add_to_bus(&bus, group);
            system.add_bus(bus);
        }
        system.start().unwrap();
        wait_for_blocks(&collector, 4);
        system.close();
        collector.blocks()
    };

    // Mute A: only B is audible.
    let blocks = build(true, false, false);
    assert!((block_peak(&blocks[1]) - 0.2).abs() < 1e-3);

    // Solo A: B is suppressed.
    let blocks = build(false, true, false);
    assert!((block_peak(&blocks[1]) - 0.4).abs() < 1e-3);

    // Solo both: both contribute.
    let blocks = build(false, true, true);
    assert!(block_peak(&blocks[1]) > 0.41);
}

#[test]
fn s5_limiter_bounds_and_clips_are_counted() {
    let (mut system, collector) = test_system(LimiterConfig {
        enabled: true,
        threshold: 0.95,
    });
    let source = Arc::new(Source::sine(441.0, 1.0, RATE, 0.5));
    source.set_loop(true, 0, None);
    route_single(&system, &source);
    system.set_master_volume(3.0); // clamps to 2.0: pre-limiter peak hits 1.0

    source.play(0.0);
    system.start().unwrap();
    wait_for_blocks(&collector, 6);
    system.close();

    let blocks = collector.blocks();
    for block in &blocks {
        assert!(block.iter().all(|&s| s.abs() <= 0.95 + 1e-6));
    }
    // Every mixed block carries a full-scale crest, so every block clips.
    assert!(system.metrics().clip_count >= blocks.len() as u64 - 1);
}

#[test]
fn s6_send_into_unity_aux_doubles_the_dry_signal() {
    let (mut system, collector) = test_system(limiter_off());
    let source = Arc::new(Source::sine(441.0, 1.0, RATE, 0.25));
    source.set_loop(true, 0, None);

    let group = system.create_group("");
    system.add_to_group(&group, Arc::clone(&source)).unwrap();
    let bus = system.create_bus("main");
    system.add_to_bus(&bus, group);
    bus.add_send("rev", 1.0);
    system.add_bus(bus);

    // A zero-gain EQ is a bit-exact unity effect.
    let aux = system.create_bus("rev");
    aux.add_effect(Box::new(EqFilter::new(RATE, FilterKind::Lowpass)));
    system.add_aux_bus(aux);

    source.play(0.0);
    system.start().unwrap();
    wait_for_blocks(&collector, 3);
    system.close();

    let blocks = collector.blocks();
    let step = 2.0 * std::f32::consts::PI * 441.0 / RATE as f32;
    for (b, block) in blocks.iter().take(3).enumerate() {
        for n in 0..PERIOD {
            let frame = (b * PERIOD + n) as f32;
            let dry = 0.25 * (step * frame).sin();
            let expected = 2.0 * dry;
            assert!(
                (block[2 * n] - expected).abs() < 1e-6,
                "block {b} frame {n}: {} vs {expected}",
                block[2 * n]
            );
        }
    }
}
