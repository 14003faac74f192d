//! Play a small mixed graph on the default output device:
//! a sine group and a noise group on the main bus, with a reverb aux.

use mezcla_engine::{EngineConfig, Reverb, Source, System};
use std::sync::Arc;
use std::time::Duration;

fn main() -> mezcla_engine::Result<()> {
    let mut system = System::open(EngineConfig::default())?;
    let rate = system.sample_rate();

    let tones = system.create_group("tones");
    let noise = system.create_group("noise");

    let tone = Arc::new(Source::sine(440.0, 4.0, rate, 0.4));
    let hiss = Arc::new(Source::white_noise(4.0, rate, 0.05));
    system.add_to_group(&tones, Arc::clone(&tone))?;
    system.add_to_group(&noise, Arc::clone(&hiss))?;

    let main = system.create_bus("main");
    system.add_to_bus(&main, tones);
    system.add_to_bus(&main, noise);
    main.add_send("rev", 0.4);
    system.add_bus(main);

    let rev = system.create_bus("rev");
    rev.add_effect(Box::new(Reverb::new(rate)));
    system.add_aux_bus(rev);

    system.start()?;
    tone.play(0.2);
    hiss.play(1.0);

    for _ in 0..8 {
        std::thread::sleep(Duration::from_millis(500));
        let m = system.metrics();
        println!(
            "peak [{:.3} {:.3}]  rms [{:.3} {:.3}]  cpu {:.1}%  clips {}  underruns {}",
            m.peak[0], m.peak[1], m.rms[0], m.rms[1], m.cpu_usage, m.clip_count, m.underrun_count
        );
    }

    tone.stop(0.3);
    hiss.stop(0.3);
    std::thread::sleep(Duration::from_millis(500));
    system.close();
    Ok(())
}
