//! A stand-in for the headset application: a background thread that streams
//! synthetic measurement bundles over UDP, so the rest of the system can be
//! exercised without hardware.
//!
//! Each bundle is the full complement a real headset sends per tick: eight
//! raw records of 25 readings, eight alpha records, and one valence record,
//! prefixed with the bundle marker (940 payload bytes, within the default
//! 1024-byte receive buffer).

use crate::frame_decoder::{encode_alpha, encode_raw, encode_valence, BUNDLE_MARKER};
use crate::session::ELECTRODES;

use log::warn;
use rand::prelude::*;
use std::f64::consts::PI;
use std::net::{SocketAddr, UdpSocket};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

const READINGS_PER_RAW_RECORD: usize = 25;

/// Runtime adjustments accepted by a running [`DummyHeadset`].
enum Signal {
    Amplitude(f64),
    Noise(f64),
    Stop,
}

/// Configuration for a [`DummyHeadset`], built up fluently.
#[derive(Debug, Clone)]
pub struct DummyHeadsetBuilder {
    target: SocketAddr,
    rate: f64,
    amplitude: f64,
    noise: f64,
}

impl DummyHeadsetBuilder {
    /// Bundles sent per second.
    pub fn rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    /// Peak amplitude of the synthetic electrode waves.
    pub fn amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Uniform jitter added to every reading.
    pub fn noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    /// Binds a sending socket and starts the streamer thread.
    pub fn build(self) -> std::io::Result<DummyHeadset> {
        let socket = UdpSocket::bind("127.0.0.1:0")?;
        socket.connect(self.target)?;

        let (tx, rx) = mpsc::channel::<Signal>();
        let period = Duration::from_secs_f64(1.0 / self.rate);

        let handle = thread::spawn(move || {
            let mut rng = thread_rng();
            let mut amplitude = self.amplitude;
            let mut noise = self.noise;
            let mut tick = 0u64;
            let mut running = true;
            while running {
                if let Ok(received) = rx.try_recv() {
                    match received {
                        Signal::Amplitude(a) => amplitude = a,
                        Signal::Noise(n) => noise = n,
                        Signal::Stop => running = false,
                    }
                }
                let bundle = synthesize_bundle(tick, amplitude, noise, &mut rng);
                if let Err(e) = socket.send(&bundle) {
                    warn!("dummy headset failed to send: {}", e);
                }
                tick += 1;
                spin_sleep::sleep(period);
            }
        });

        Ok(DummyHeadset {
            handle: Some(handle),
            tx,
        })
    }
}

/// Handle to the streamer thread. Dropping it without calling
/// [`stop`](DummyHeadset::stop) leaves the thread running detached.
pub struct DummyHeadset {
    handle: Option<thread::JoinHandle<()>>,
    tx: mpsc::Sender<Signal>,
}

impl DummyHeadset {
    /// Starts describing a streamer aimed at `target` (usually a session's
    /// local address). Defaults: 40 bundles/s, amplitude 1.0, noise 0.05.
    pub fn builder(target: SocketAddr) -> DummyHeadsetBuilder {
        DummyHeadsetBuilder {
            target,
            rate: 40.0,
            amplitude: 1.0,
            noise: 0.05,
        }
    }

    /// Adjusts the wave amplitude of the running streamer.
    pub fn set_amplitude(&self, amplitude: f64) {
        let _ = self.tx.send(Signal::Amplitude(amplitude));
    }

    /// Adjusts the reading jitter of the running streamer.
    pub fn set_noise(&self, noise: f64) {
        let _ = self.tx.send(Signal::Noise(noise));
    }

    /// Tells the thread to finish its current tick and joins it.
    pub fn stop(&mut self) {
        let _ = self.tx.send(Signal::Stop);
        if let Some(thread) = self.handle.take() {
            let _ = thread.join();
        }
    }
}

fn jitter(noise: f64, rng: &mut ThreadRng) -> f64 {
    if noise > 0.0 {
        rng.gen_range(-noise..noise)
    } else {
        0.0
    }
}

fn synthesize_bundle(tick: u64, amplitude: f64, noise: f64, rng: &mut ThreadRng) -> Vec<u8> {
    let t = tick as f64 / 40.0;

    let mut bundle = BUNDLE_MARKER.to_vec();
    for electrode in 0..ELECTRODES {
        // Each electrode gets its own frequency so the channels are
        // visually distinguishable.
        let freq = 1.0 + electrode as f64 * 0.25;
        let readings: Vec<f64> = (0..READINGS_PER_RAW_RECORD)
            .map(|i| {
                let phase = t + i as f64 / READINGS_PER_RAW_RECORD as f64 / 40.0;
                amplitude * (2.0 * PI * freq * phase).sin() + jitter(noise, rng)
            })
            .collect();
        bundle.extend_from_slice(&encode_raw(electrode as u8, &readings));
    }
    for electrode in 0..ELECTRODES {
        // Alpha drifts slowly; its long-term average lags behind it.
        let alpha = amplitude * 0.5 * (0.2 * t + electrode as f64).sin() + jitter(noise, rng);
        let lta = amplitude * 0.5 * (0.2 * (t - 2.0) + electrode as f64).sin();
        bundle.extend_from_slice(&encode_alpha(electrode as u8, alpha, lta));
    }
    let valence = amplitude * (0.1 * t).sin() + jitter(noise, rng);
    let lta = amplitude * (0.1 * (t - 5.0)).sin();
    bundle.extend_from_slice(&encode_valence(valence, lta));
    bundle
}
