use parking_lot::Mutex;
use starsonic::{
    AudioOutput, DirectoryAssets, Playlist, SharedBackend, SoftwareBackend, SoundEnvironment,
    StarSonicDesc, StarSonicEngine,
};
use std::sync::Arc;
use std::time::Duration;

/// Plays the sounds and music found under a data directory.
///
/// Usage: `cargo run --example starsonic_demo -- <data dir>`, where the
/// directory holds `snd/sounds/*.wav|ogg` and `snd/music/*.ogg`.
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let root = std::env::args().nth(1).unwrap_or_else(|| ".".to_string());
    let desc = StarSonicDesc::default().voices(32);

    let software = Arc::new(Mutex::new(SoftwareBackend::new(
        desc.sample_rate,
        desc.channels,
    )));
    let mut output = AudioOutput::start(&desc, software.clone())?;
    let backend: SharedBackend = software;

    let engine = StarSonicEngine::new(desc, Arc::new(DirectoryAssets::new(&root)), backend)?;
    println!(
        "Loaded {} sounds",
        engine.sounds().map_or(0, |sounds| sounds.len())
    );

    if let Some(music) = engine.music() {
        let tracks = music.available_tracks();
        println!("Music tracks: {:?}", tracks);
        music.set_selector(Playlist::new().with_fallback(tracks));
        music.choose("idle");
    }

    let names: Vec<String> = engine
        .sounds()
        .map(|sounds| sounds.names().map(str::to_string).collect())
        .unwrap_or_default();

    let tick = Duration::from_millis(16);
    let mut frame = 0u32;
    while frame < 600 {
        // One sound every second, cycling through everything that loaded.
        if frame % 60 == 0 && !names.is_empty() {
            let name = &names[(frame / 60) as usize % names.len()];
            if let Some(sound) = engine.sound_get(name) {
                println!("Playing '{}': {:?}", name, engine.play(sound));
            }
        }
        if frame == 300 {
            println!("Entering nebula");
            engine.set_environment(SoundEnvironment::Nebula(600.0));
        }

        engine.update(tick);
        for event in engine.poll_events() {
            println!("{:?}", event);
        }
        std::thread::sleep(tick);
        frame += 1;
    }

    drop(engine);
    output.stop();
    println!(
        "Rendered {} frames ({} blocks skipped under contention)",
        output.frames_processed(),
        output.contended_blocks()
    );
    Ok(())
}
