//! Interactive voice transcription loop for the terminal.
//!
//! Captures microphone audio with voice-activity endpointing, sends the
//! capture to a transcription endpoint, and optionally speaks the response
//! back. Device listing and all tuning knobs live on the CLI.

mod repl;

use anyhow::Result;
use talkterm::audio::list_input_devices;
use talkterm::telemetry::init_tracing;
use talkterm::AppConfig;

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    init_tracing(&config);

    if config.list_input_devices {
        let devices = list_input_devices()?;
        if devices.is_empty() {
            println!("no audio input devices detected");
        } else {
            for (index, name) in devices.iter().enumerate() {
                println!("{index}: {name}");
            }
        }
        return Ok(());
    }

    repl::run(&config)
}
