//! Registry of live connections keyed by peripheral
//!
//! Plays the role of a central manager: one connection task per peripheral
//! identifier, created on connect and stopped on disconnect or shutdown.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::task::{ConnectionHandle, ConnectionParts, ConnectionTask};

struct Registered {
    handle: ConnectionHandle,
    join: JoinHandle<()>,
}

/// Tracks one connection task per peripheral
pub struct ConnectionRegistry {
    config: RuntimeConfig,
    connections: DashMap<Uuid, Registered>,
    // reserved under the entry lock; `DashMap::len` would deadlock there
    slots: AtomicUsize,
}

impl ConnectionRegistry {
    pub fn new(config: RuntimeConfig) -> RuntimeResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connections: DashMap::new(),
            slots: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Spawn a connection task for `peripheral`
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self, peripheral: Uuid) -> RuntimeResult<ConnectionParts> {
        match self.connections.entry(peripheral) {
            Entry::Occupied(_) => Err(RuntimeError::AlreadyRegistered { peripheral }),
            Entry::Vacant(slot) => {
                self.reserve_slot()?;
                let (parts, join) = match ConnectionTask::spawn(peripheral, &self.config) {
                    Ok(spawned) => spawned,
                    Err(err) => {
                        self.release_slot();
                        return Err(err);
                    }
                };
                slot.insert(Registered {
                    handle: parts.handle.clone(),
                    join,
                });
                info!(peripheral = %peripheral, "peripheral registered");
                Ok(parts)
            }
        }
    }

    /// Application handle for a registered peripheral
    pub fn get(&self, peripheral: &Uuid) -> Option<ConnectionHandle> {
        self.connections
            .get(peripheral)
            .map(|entry| entry.handle.clone())
    }

    /// Stop the task for `peripheral` and forget it
    pub fn disconnect(&self, peripheral: &Uuid) -> RuntimeResult<()> {
        let (_, registered) = self
            .connections
            .remove(peripheral)
            .ok_or(RuntimeError::UnknownPeripheral {
                peripheral: *peripheral,
            })?;
        self.release_slot();

        if registered.handle.shutdown().is_err() {
            debug!(peripheral = %peripheral, "connection task already stopped");
        }
        info!(peripheral = %peripheral, "peripheral disconnected");
        Ok(())
    }

    /// Peripherals whose channel is currently open
    pub fn connected_peripherals(&self) -> Vec<Uuid> {
        self.connections
            .iter()
            .filter(|entry| entry.handle.is_open())
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Stop every task and wait for each to finish
    pub async fn shutdown(&self) {
        let peripherals: Vec<Uuid> = self.connections.iter().map(|entry| *entry.key()).collect();

        for peripheral in peripherals {
            let Some((_, registered)) = self.connections.remove(&peripheral) else {
                continue;
            };
            self.release_slot();
            if registered.handle.shutdown().is_err() {
                debug!(peripheral = %peripheral, "connection task already stopped");
            }
            if let Err(err) = registered.join.await {
                warn!(peripheral = %peripheral, error = %err, "connection task panicked");
            }
        }
        info!("connection registry shut down");
    }

    fn reserve_slot(&self) -> RuntimeResult<()> {
        let max = self.config.max_connections;
        self.slots
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                (used < max).then_some(used + 1)
            })
            .map(|_| ())
            .map_err(|_| RuntimeError::TooManyConnections { max })
    }

    fn release_slot(&self) {
        self.slots.fetch_sub(1, Ordering::AcqRel);
    }
}
