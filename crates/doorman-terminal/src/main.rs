//! Interactive doorman terminal.
//!
//! Runs the whole stack in one process with the mock matrix standing in
//! for real hardware: characters typed on stdin become keypad taps, and
//! after each input line the LED and display state is printed back.

use anyhow::Context;
use doorman_core::constants::KEYMAP;
use doorman_keypad::{DecoderConfig, KeypadDecoder, MockMatrix};
use doorman_panel::{DisplayHandle, DisplayPanel, LedHandle, LedMode, LedPanel};
use doorman_session::{DenialPolicy, Session, SessionRunner};
use doorman_store::CredentialStore;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    time::{Duration, sleep},
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("doorman terminal v{}", doorman_core::VERSION);

    let policy = match std::env::var("DOORMAN_DENIAL_POLICY").ok().as_deref() {
        Some("detailed") => DenialPolicy::Detailed,
        _ => DenialPolicy::Collapsed,
    };

    let store = CredentialStore::seeded();
    info!(users = store.len(), ?policy, "credential store seeded");

    let (matrix, keypad) = MockMatrix::new();
    let (decoder, keys, _probe) = KeypadDecoder::new(matrix, DecoderConfig::default());
    tokio::spawn(decoder.run());

    let (led_panel, leds) = LedPanel::new();
    tokio::spawn(led_panel.run());
    let (display_panel, display) = DisplayPanel::new();
    tokio::spawn(display_panel.run());

    print_banner(&store);

    let session = Session::new(store, policy);
    tokio::spawn(SessionRunner::new(session, keys, leds.clone(), display.clone()).run());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        sleep(Duration::from_millis(300)).await;
        print_panels(&leds, &display);

        let Some(line) = lines.next_line().await.context("reading stdin")? else {
            break;
        };
        for key in line.trim().chars() {
            if key == ' ' {
                continue;
            }
            if let Err(err) = keypad.tap(key, Duration::from_millis(100)).await {
                warn!(%err, "not a keypad key");
                continue;
            }
            // Give the decoder its release debounce before the next tap.
            sleep(Duration::from_millis(150)).await;
        }
    }

    Ok(())
}

fn print_banner(store: &CredentialStore) {
    println!("doorman terminal (type keys and press enter; Ctrl-D quits)");
    println!();
    println!("  keypad layout:");
    for row in KEYMAP {
        print!("   ");
        for key in row {
            print!(" [{key}]");
        }
        println!();
    }
    println!();
    println!("  enter an ID (6 digits) then #, a password (4 digits) then #");
    println!("  * cancels, or opens the password-change menu from standby");
    println!("  seeded users:");
    for user in store.status() {
        println!("    {} / {}", user.id, user.pin.as_str());
    }
    println!();
}

fn print_panels(leds: &LedHandle, display: &DisplayHandle) {
    let snap = display.snapshot();
    println!("  +{}+", "-".repeat(snap.lines[0].len()));
    for line in &snap.lines {
        println!("  |{line}|");
    }
    println!("  +{}+", "-".repeat(snap.lines[0].len()));

    let led = leds.snapshot();
    println!(
        "  green: {}  red: {}  amber: {}",
        if led.green { "ON " } else { "off" },
        if led.red { "ON " } else { "off" },
        match led.amber {
            LedMode::Off => "off",
            LedMode::On => "ON",
            LedMode::Blink =>
                if led.amber_lit {
                    "BLINK (lit)"
                } else {
                    "BLINK (dark)"
                },
        }
    );
    println!();
}
