//! Thin terminal driver: binds a telemetry session, optionally feeds it
//! from the built-in synthetic headset, and logs derived statistics at a
//! steady tick. Stands in for the installation's rendering loop.

use clap::Parser;
use headwave::{
    args::MonitorArgs,
    dummy_headset::DummyHeadset,
    session::{Poll, SessionConfig, SessionError, TelemetrySession},
};
use log::{error, info, warn};
use std::time::Duration;

fn main() {
    env_logger::init();
    let args = MonitorArgs::parse();

    let config = SessionConfig {
        host: args.host,
        port: args.port,
        history: args.history,
        buffer_size: args.buffer,
    };
    let mut session = match TelemetrySession::bind(&config) {
        Ok(session) => session,
        Err(e) => {
            error!("could not bind session: {}", e);
            std::process::exit(1);
        }
    };
    info!("listening on {}", session.local_addr().unwrap());

    let mut dummy = if args.dummy {
        match DummyHeadset::builder(session.local_addr().unwrap())
            .rate(args.rate)
            .build()
        {
            Ok(dummy) => Some(dummy),
            Err(e) => {
                error!("could not start dummy headset: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        None
    };

    let period = Duration::from_secs_f64(1.0 / args.rate);
    let mut buffer_size = config.buffer_size;
    let mut tick = 0u64;
    loop {
        match session.poll(buffer_size) {
            Ok(Poll::NoData) => {}
            Ok(Poll::Applied { skipped, .. }) if skipped > 0 => {
                warn!("skipped {} records this datagram", skipped);
            }
            Ok(Poll::Applied { .. }) => {}
            Err(SessionError::BufferTooSmall { buffer_size: used }) => {
                // Retry next tick with twice the room.
                buffer_size = used * 2;
                warn!("datagram exceeded {} bytes, growing buffer", used);
            }
            Err(e) => {
                error!("poll failed: {}", e);
                break;
            }
        }

        if tick % args.report_every.max(1) == 0 {
            report(&session);
        }
        tick += 1;
        spin_sleep::sleep(period);
    }

    if let Some(dummy) = dummy.as_mut() {
        dummy.stop();
    }
    session.close();
}

fn report(session: &TelemetrySession) {
    let raw: Vec<String> = session
        .raw()
        .iter()
        .map(|ch| format!("{:+.2}", ch.current().unwrap_or(0.0)))
        .collect();
    info!("raw     [{}]", raw.join(" "));

    for (i, ch) in session.alpha().iter().enumerate() {
        if ch.is_empty() {
            continue;
        }
        info!(
            "alpha {} cur {:+.3} lta {:+.3} avg {:+.3} slope {:+.2} angle {:+5.1}",
            i,
            ch.current().unwrap_or(0.0),
            ch.long_term_average().unwrap_or(0.0),
            ch.avg(),
            ch.slope(),
            ch.angle(),
        );
    }

    let valence = session.valence();
    if !valence.is_empty() {
        info!(
            "valence cur {:+.3} lta {:+.3} min {:+.3} max {:+.3} slope {:+.2}",
            valence.current().unwrap_or(0.0),
            valence.long_term_average().unwrap_or(0.0),
            valence.min().unwrap_or(0.0),
            valence.max().unwrap_or(0.0),
            valence.slope(),
        );
    }
}
