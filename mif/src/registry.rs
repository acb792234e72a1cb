//! Transport registry
//!
//! Bus glue registers each probed transport here; client drivers (the
//! subsystem manager and friends) register to be told about them. Clients
//! linked into the image register statically through [`MIF_CLIENT_DRIVERS`]:
//!
//! ```ignore
//! #[distributed_slice(MIF_CLIENT_DRIVERS)]
//! static MXMAN: MifClientDriver = MifClientDriver {
//!     name: "mxman",
//!     probe: mxman_probe,
//!     remove: mxman_remove,
//! };
//! ```
//!
//! Callbacks run with the registry locked and must not call back into it.

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use conquer_once::spin::OnceCell;
use linkme::distributed_slice;
use log::{debug, error, info, warn};
use spin::Mutex;
use thiserror::Error;

use crate::{MifResult, MifTransport};

#[distributed_slice]
pub static MIF_CLIENT_DRIVERS: [MifClientDriver] = [..];

/// Process-wide registry, set up by [`init`].
pub static MIF_REGISTRY: OnceCell<Mutex<MifRegistry>> = OnceCell::uninit();

/// Create [`MIF_REGISTRY`] with every statically registered client.
pub fn init() {
    MIF_REGISTRY.init_once(|| {
        let mut registry = MifRegistry::new();
        for driver in MIF_CLIENT_DRIVERS.iter() {
            if let Err(err) = registry.register_driver(*driver) {
                error!("{err}");
            }
        }
        Mutex::new(registry)
    });
}

#[derive(Copy, Clone)]
pub struct MifClientDriver {
    pub name: &'static str,
    pub probe: fn(&str, &Arc<dyn MifTransport>),
    pub remove: fn(&str, &Arc<dyn MifTransport>),
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum RegistryError {
    #[error("client driver {0} already registered")]
    DriverExists(&'static str),
    #[error("no client driver named {0}")]
    UnknownDriver(String),
    #[error("transport {0} already registered")]
    TransportExists(String),
    #[error("no transport with id {0}")]
    UnknownTransport(String),
}

#[derive(Default)]
pub struct MifRegistry {
    drivers: Vec<MifClientDriver>,
    transports: Vec<(String, Arc<dyn MifTransport>)>,
}

impl MifRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transport and hand it to every registered client.
    pub fn probe_transport(
        &mut self,
        id: &str,
        mif: Arc<dyn MifTransport>,
    ) -> Result<(), RegistryError> {
        if self.transport(id).is_some() {
            return Err(RegistryError::TransportExists(id.to_string()));
        }
        info!("transport {id} ({:?}) registered", mif.kind());
        for driver in &self.drivers {
            debug!("probing {} on {id}", driver.name);
            (driver.probe)(id, &mif);
        }
        self.transports.push((id.to_string(), mif));
        Ok(())
    }

    /// Tell every client the transport is going away, then drop it.
    pub fn remove_transport(&mut self, id: &str) -> Result<Arc<dyn MifTransport>, RegistryError> {
        let index = self
            .transports
            .iter()
            .position(|(tid, _)| tid == id)
            .ok_or_else(|| RegistryError::UnknownTransport(id.to_string()))?;
        let (id, mif) = self.transports.remove(index);
        for driver in &self.drivers {
            (driver.remove)(&id, &mif);
        }
        info!("transport {id} removed");
        Ok(mif)
    }

    /// Add a client and probe it on every registered transport.
    pub fn register_driver(&mut self, driver: MifClientDriver) -> Result<(), RegistryError> {
        if self.drivers.iter().any(|d| d.name == driver.name) {
            return Err(RegistryError::DriverExists(driver.name));
        }
        for (id, mif) in &self.transports {
            (driver.probe)(id, mif);
        }
        debug!("client driver {} registered", driver.name);
        self.drivers.push(driver);
        Ok(())
    }

    /// Remove a client, detaching it from every transport first.
    pub fn unregister_driver(&mut self, name: &str) -> Result<(), RegistryError> {
        let index = self
            .drivers
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| RegistryError::UnknownDriver(name.to_string()))?;
        let driver = self.drivers.remove(index);
        for (id, mif) in &self.transports {
            (driver.remove)(id, mif);
        }
        debug!("client driver {name} unregistered");
        Ok(())
    }

    #[must_use]
    pub fn transport(&self, id: &str) -> Option<Arc<dyn MifTransport>> {
        self.transports
            .iter()
            .find(|(tid, _)| tid == id)
            .map(|(_, mif)| mif.clone())
    }

    pub fn transport_ids(&self) -> impl Iterator<Item = &str> {
        self.transports.iter().map(|(id, _)| id.as_str())
    }

    pub fn driver_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.drivers.iter().map(|d| d.name)
    }

    /// Suspend every transport in registration order. The first refusal
    /// resumes the ones already suspended and is returned.
    pub fn suspend_all(&self) -> MifResult<()> {
        for (done, (id, mif)) in self.transports.iter().enumerate() {
            if let Err(err) = mif.suspend() {
                warn!("transport {id} refused to suspend: {err}");
                for (id, mif) in self.transports[..done].iter().rev() {
                    debug!("resuming {id}");
                    mif.resume();
                }
                return Err(err);
            }
        }
        Ok(())
    }

    pub fn resume_all(&self) {
        for (id, mif) in &self.transports {
            debug!("resuming {id}");
            mif.resume();
        }
    }
}
