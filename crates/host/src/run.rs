// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The daemon run loop.
//!
//! One task owns the entire entity tree (single-threaded cooperative
//! model): transport frames and hardware events arrive over channels,
//! timers fire through the host's own deadline bookkeeping, and outgoing
//! frames drain into per-connection writer channels after every step.

use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vdcapi::dsuid::DSUID_NAMESPACE;
use vdcapi::DsUid;

use crate::api::session;
use crate::api::transport::{self, TransportEvent, WriterMap};
use crate::backends::demo::{DemoBackend, DemoPopulation};
use crate::clock::SystemClock;
use crate::config::Config;
use crate::host::{Outgoing, VdcHost};
use crate::persist::ParamStore;
use crate::scripting::NullRunner;
use crate::vdc::Vdc;

/// Resolve the host identity: externally assigned beats derived.
fn host_dsuid(config: &Config) -> DsUid {
    if let Some(text) = &config.dsuid {
        if let Ok(dsuid) = text.parse() {
            return dsuid;
        }
    }
    DsUid::from_name_in_space(&format!("vdchost/{}/{}", config.name, config.instance), &DSUID_NAMESPACE)
}

/// Build the host with its configured vdcs and populate them.
pub fn build_host(config: &Config) -> anyhow::Result<VdcHost> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;
    let store = ParamStore::open(&config.data_dir)?;
    let dsuid = host_dsuid(config);
    info!(%dsuid, name = %config.name, "host identity");
    let mut host = VdcHost::new(dsuid, config.name.clone(), store, Box::new(NullRunner));
    let population = DemoPopulation {
        lights: config.demo_lights,
        shades: config.demo_shades,
        buttons: config.demo_buttons,
    };
    let backend = DemoBackend::new(population);
    let vdc = Vdc::new(&host.dsuid, config.instance, "demo devices", Box::new(backend));
    let vdc_dsuid = host.add_vdc(vdc);
    // discovery, then adoption through the host (dedupe, settings load)
    let found = {
        let vdc = host
            .vdcs
            .get_mut(&vdc_dsuid)
            .context("vdc vanished during setup")?;
        vdc.backend.scan_for_devices(false)?
    };
    for device in found {
        host.add_device(&vdc_dsuid, device)?;
    }
    info!(devices = host.total_devices(), "population collected");
    if let Some(path) = &config.init_script {
        let code = std::fs::read_to_string(path)
            .with_context(|| format!("reading init script {}", path.display()))?;
        if let Err(err) = host.controller.runner.run("initscript", &code) {
            warn!(%err, "init script failed");
        }
    }
    host.start_main_script();
    Ok(host)
}

/// Run the daemon until ctrl-c.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let mut host = build_host(&config)?;
    let clock = SystemClock::new();

    let listener = TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("binding {}", config.bind_addr()))?;
    info!(addr = %config.bind_addr(), "vDC API listening");

    let (events_tx, mut events_rx) = mpsc::channel::<TransportEvent>(256);
    let writers: WriterMap = Default::default();
    let shutdown = CancellationToken::new();
    tokio::spawn(transport::serve(listener, events_tx, writers.clone(), shutdown.clone()));

    let flush_interval = Duration::from_secs(config.flush_interval);
    let mut next_flush = clock.now() + flush_interval;

    loop {
        // drain outgoing frames before sleeping
        let outgoing = std::mem::take(&mut host.outbox);
        if !outgoing.is_empty() {
            let writers = writers.lock().await;
            for Outgoing::Frame { connection_id, frame } in outgoing {
                let Some(tx) = writers.get(&connection_id) else { continue };
                match serde_json::to_string(&frame) {
                    Ok(line) => {
                        if tx.try_send(line).is_err() {
                            warn!(connection_id, "connection cannot keep up, frame dropped");
                        }
                    }
                    Err(err) => warn!(%err, "frame serialization failed"),
                }
            }
        }

        let wakeup = crate::clock::earliest(host.next_wakeup(), Some(next_flush));
        let sleep_until = wakeup.map(|at| clock.instant_for(at));
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            event = events_rx.recv() => {
                let now = clock.now();
                match event {
                    Some(TransportEvent::Connected { connection_id }) => {
                        info!(connection_id, "connection ready for hello");
                    }
                    Some(TransportEvent::Frame { connection_id, frame }) => {
                        session::handle_frame(&mut host, connection_id, frame, now);
                    }
                    Some(TransportEvent::Disconnected { connection_id }) => {
                        session::connection_closed(&mut host, connection_id);
                    }
                    None => break,
                }
            }
            _ = async {
                match sleep_until {
                    Some(at) => tokio::time::sleep_until(at.into()).await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                let now = clock.now();
                host.tick(now);
                if now >= next_flush {
                    next_flush = now + flush_interval;
                    if let Err(err) = host.store.flush() {
                        warn!(%err, "periodic store flush failed");
                    }
                }
            }
        }
    }
    shutdown.cancel();
    // persist everything on the way out
    host.save_all_settings();
    host.store.flush()?;
    Ok(())
}
