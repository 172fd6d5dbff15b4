//! The Enter-to-record loop: language menu, capture, transcription, retries.

use anyhow::{bail, Context, Result};
use crossbeam_channel::{bounded, Receiver};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use talkterm::audio::{
    stop_channel, wav, CapturedAudio, CpalSource, RecordingSession, SessionConfig, StopHandle,
};
use talkterm::lang::{self, Language};
use talkterm::stt::{HttpTranscriber, TranscriptionClient};
use talkterm::tts::{self, HttpSynthesizer, SynthesisClient};
use talkterm::AppConfig;

/// Attempts per capture before the failure is reported to the outer loop.
const MAX_ATTEMPTS: usize = 2;
/// Consecutive failed captures before the tuning tip is shown.
const FAILURE_TIP_AFTER: usize = 3;

pub fn run(config: &AppConfig) -> Result<()> {
    let transcriber = HttpTranscriber::new(
        config.stt_endpoint.clone(),
        config.api_key.clone(),
        config.http_timeout(),
    )?;
    let synthesizer = if config.speak {
        Some(HttpSynthesizer::new(
            config.tts_endpoint.clone(),
            config.api_key.clone(),
            config.http_timeout(),
        )?)
    } else {
        None
    };

    let Some(mut language) = select_language(config)? else {
        return Ok(());
    };
    let session = SessionConfig::from(config);

    let mut consecutive_failures = 0usize;
    loop {
        print!(
            "\n[{}] Press Enter to record ('lang' to switch language, 'q' to quit): ",
            language.tag
        );
        io::stdout().flush()?;
        let command = read_line()?;
        match command.trim() {
            "q" | "quit" => break,
            "lang" => {
                match select_language_from_menu()? {
                    Some(choice) => language = choice,
                    None => break,
                }
                continue;
            }
            _ => {}
        }

        println!("Listening...");
        match transcribe_once(config, &session, &transcriber, language) {
            Ok(text) => {
                consecutive_failures = 0;
                println!("You said: {text}");
                if let Some(synth) = &synthesizer {
                    speak_reply(synth, &text, language);
                }
            }
            Err(err) => {
                consecutive_failures += 1;
                eprintln!("Capture failed: {err}");
                if consecutive_failures >= FAILURE_TIP_AFTER {
                    eprintln!(
                        "Tip: check the input device with --list-input-devices or lower \
                         --energy-threshold if your microphone is quiet."
                    );
                }
            }
        }
    }

    Ok(())
}

/// One capture plus transcription, retrying in place on the retryable
/// failures (no speech heard, nothing recognized).
fn transcribe_once(
    config: &AppConfig,
    session: &SessionConfig,
    transcriber: &HttpTranscriber,
    language: &Language,
) -> Result<String> {
    for attempt in 1..=MAX_ATTEMPTS {
        let audio = match capture_once(config, session) {
            Ok(audio) => audio,
            Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                println!("No speech detected, try again.");
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        tracing::info!(
            duration_ms = audio.duration().as_millis() as u64,
            attempt,
            "capture complete"
        );

        if let Some(path) = &config.save_wav {
            wav::write_wav(&audio, path)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }

        match transcriber.transcribe(&audio, language.tag) {
            Ok(text) => return Ok(text),
            Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                println!("Didn't catch that, try again.");
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    bail!("capture retries exhausted")
}

/// Run one recording session against the configured device with an
/// Enter/Esc keypress listener raising the manual stop signal.
fn capture_once(
    config: &AppConfig,
    session: &SessionConfig,
) -> Result<CapturedAudio, talkterm::CaptureError> {
    let mut source = CpalSource::open(
        &config.device_selector(),
        session.sample_rate,
        session.frame_size,
    )?;
    let (stop_handle, stop_token) = stop_channel();
    let (done_tx, done_rx) = bounded::<()>(1);

    // Raw mode can fail when stdin is not a terminal; capture still works,
    // only the manual stop key is unavailable then.
    let listener = if enable_raw_mode().is_ok() {
        Some(spawn_stop_listener(stop_handle, done_rx))
    } else {
        None
    };

    let result = RecordingSession::start(&mut source, session, Some(stop_token));

    let _ = done_tx.try_send(());
    if let Some(handle) = listener {
        let _ = handle.join();
        let _ = disable_raw_mode();
    }
    tracing::debug!(
        frames_dropped = source.frames_dropped(),
        "capture source released"
    );
    result
}

fn spawn_stop_listener(stop: StopHandle, done: Receiver<()>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while done.try_recv().is_err() {
            match event::poll(Duration::from_millis(100)) {
                Ok(true) => {
                    if let Ok(Event::Key(key)) = event::read() {
                        if key.kind == KeyEventKind::Press
                            && matches!(key.code, KeyCode::Enter | KeyCode::Esc)
                        {
                            stop.stop();
                        }
                    }
                }
                Ok(false) => {}
                Err(_) => break,
            }
        }
    })
}

fn speak_reply(synth: &HttpSynthesizer, text: &str, language: &Language) {
    let reply = lang::echo_response(text, language.tag);
    println!("Reply: {reply}");
    match synth.synthesize(&reply, language.tag) {
        Ok(audio) => {
            if let Err(err) = tts::play(&audio) {
                eprintln!("Playback failed: {err}");
            }
        }
        Err(err) => eprintln!("Synthesis failed: {err}"),
    }
}

/// Resolve the working language: the --language flag if given, otherwise the
/// interactive menu. `None` means the user chose to quit.
fn select_language(config: &AppConfig) -> Result<Option<&'static Language>> {
    if let Some(tag) = &config.language {
        // Validation already confirmed the tag is in the table.
        return Ok(lang::by_tag(tag));
    }
    select_language_from_menu()
}

fn select_language_from_menu() -> Result<Option<&'static Language>> {
    println!("Languages:");
    for (index, entry) in lang::LANGUAGES.iter().enumerate() {
        println!("{:>2}. {} ({})", index + 1, entry.name, entry.native);
    }
    loop {
        print!("Select a language [1-{}] ('q' to quit): ", lang::LANGUAGES.len());
        io::stdout().flush()?;
        let line = read_line()?;
        let choice = line.trim();
        if choice.eq_ignore_ascii_case("q") {
            return Ok(None);
        }
        if let Some(entry) = choice.parse::<usize>().ok().and_then(lang::by_menu_index) {
            return Ok(Some(entry));
        }
        println!("Invalid selection '{choice}'.");
    }
}

fn read_line() -> Result<String> {
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line)
}
