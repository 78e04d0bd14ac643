//! Generic device controller: CRUD over one record family plus the live-work
//! registry derived from it.
//!
//! Every mutation runs under one mutex, so for a given id create, update,
//! delete and schedule calls are totally ordered and the registry matches
//! the stored enable flags whenever the lock is released. Work that has
//! been cancelled is dropped only after the lock is released, so waiting
//! for a polling thread to wind down never stalls other callers.
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reef_traits::{BoxError, RecordStore};
use tracing::{debug, error, info, warn};

use crate::boundary;
use crate::device::{Device, Launcher};
use crate::error::{ControllerError, Result};
use crate::registry::Registry;

pub struct Controller<D: Device, L: Launcher<D>> {
    store: Arc<dyn RecordStore>,
    launcher: L,
    registry: Mutex<Registry<L::Work>>,
    _device: PhantomData<fn() -> D>,
}

impl<D: Device, L: Launcher<D>> Controller<D, L> {
    pub fn new(store: Arc<dyn RecordStore>, launcher: L) -> Self {
        Self {
            store,
            launcher,
            registry: Mutex::new(Registry::new()),
            _device: PhantomData,
        }
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    fn lock(&self) -> MutexGuard<'_, Registry<L::Work>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn not_found(id: &str) -> ControllerError {
        ControllerError::NotFound {
            bucket: D::BUCKET,
            id: id.to_string(),
        }
    }

    pub fn get(&self, id: &str) -> Result<D> {
        let bytes = self
            .store
            .get(D::BUCKET, id)
            .map_err(boundary::store)?
            .ok_or_else(|| Self::not_found(id))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// All records, in whatever order the store yields them.
    pub fn list(&self) -> Result<Vec<D>> {
        let mut devices = Vec::new();
        let mut decode_err = None;
        let walked = self.store.list(D::BUCKET, &mut |bytes| {
            match serde_json::from_slice::<D>(bytes) {
                Ok(d) => {
                    devices.push(d);
                    Ok(())
                }
                Err(e) => {
                    let msg = e.to_string();
                    decode_err = Some(e);
                    Err(msg.into())
                }
            }
        });
        if let Some(e) = decode_err {
            return Err(e.into());
        }
        walked.map_err(boundary::store)?;
        Ok(devices)
    }

    /// Validate, persist under a fresh id, and start work if the record wants
    /// it. Returns the assigned id.
    pub fn create(&self, mut device: D) -> Result<String> {
        device.validate()?;
        let mut retired = Vec::new();
        let result = {
            let mut registry = self.lock();
            self.insert_and_start(&mut registry, &mut device, &mut retired)
        };
        drop(retired);
        result
    }

    /// Persist `device` under `id`, then replace its work. Whatever ran for
    /// `id` is cancelled before anything new starts.
    pub fn update(&self, id: &str, mut device: D) -> Result<()> {
        device.set_id(id);
        device.validate()?;
        let mut retired = Vec::new();
        let result = {
            let mut registry = self.lock();
            self.ensure_exists(id).and_then(|()| {
                self.commit(&mut registry, &mut device, L::RECONCILE_ON_UPDATE, &mut retired)
            })
        };
        drop(retired);
        result
    }

    /// Read, edit, persist and reconcile work for `id` in one critical
    /// section, so concurrent edits cannot leave work that disagrees with the
    /// stored record.
    pub(crate) fn modify(&self, id: &str, edit: impl FnOnce(&mut D)) -> Result<()> {
        let mut retired = Vec::new();
        let result = {
            let mut registry = self.lock();
            self.get(id).and_then(|mut device| {
                edit(&mut device);
                device.set_id(id);
                device.validate()?;
                self.commit(&mut registry, &mut device, true, &mut retired)
            })
        };
        drop(retired);
        result
    }

    /// Cancel work for `id`, then remove the record.
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut retired = Vec::new();
        let result = {
            let mut registry = self.lock();
            self.ensure_exists(id).and_then(|()| {
                self.retire(&mut registry, id, &mut retired);
                self.store.delete(D::BUCKET, id).map_err(boundary::store)?;
                self.launcher.on_delete(id);
                info!(bucket = D::BUCKET, id, "device deleted");
                Ok(())
            })
        };
        drop(retired);
        result
    }

    /// Start work for every stored record that wants it. Failures are logged
    /// per device; returns how many devices have work afterwards.
    pub fn start(&self) -> Result<usize> {
        let mut retired = Vec::new();
        let started = {
            let mut registry = self.lock();
            for device in self.list()? {
                if let Err(e) = self.swap_work(&mut registry, &device, &mut retired) {
                    error!(bucket = D::BUCKET, id = device.id(), error = %e, "failed to start device work");
                }
            }
            registry.len()
        };
        drop(retired);
        info!(bucket = D::BUCKET, started, "controller started");
        Ok(started)
    }

    /// Cancel every registered piece of work.
    pub fn stop(&self) {
        let mut retired = Vec::new();
        {
            let mut registry = self.lock();
            for (id, mut work) in registry.drain() {
                self.launcher.cancel(&id, &mut work);
                retired.push(work);
            }
        }
        let stopped = retired.len();
        drop(retired);
        info!(bucket = D::BUCKET, stopped, "controller stopped");
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.lock().contains(id)
    }

    /// Ids with registered work, sorted.
    pub fn running(&self) -> Vec<String> {
        self.lock().ids()
    }

    pub(crate) fn with_work<R>(&self, id: &str, f: impl FnOnce(&L::Work) -> R) -> Option<R> {
        self.lock().get(id).map(f)
    }

    fn ensure_exists(&self, id: &str) -> Result<()> {
        match self.store.get(D::BUCKET, id).map_err(boundary::store)? {
            Some(_) => Ok(()),
            None => Err(Self::not_found(id)),
        }
    }

    fn persist(&self, id: &str, device: &D) -> Result<()> {
        let bytes = serde_json::to_vec(device)?;
        self.store
            .update(D::BUCKET, id, &bytes)
            .map_err(boundary::store)?;
        debug!(bucket = D::BUCKET, id, "device updated");
        Ok(())
    }

    fn insert_and_start(
        &self,
        registry: &mut Registry<L::Work>,
        device: &mut D,
        retired: &mut Vec<L::Work>,
    ) -> Result<String> {
        let id = self
            .store
            .create(D::BUCKET, &mut |id| {
                device.set_id(id);
                serde_json::to_vec(&*device).map_err(|e| Box::new(e) as BoxError)
            })
            .map_err(boundary::store)?;
        device.set_id(&id);
        info!(bucket = D::BUCKET, id = %id, name = device.name(), "device created");

        if let Err(e) = self.swap_work(registry, device, retired) {
            // Leave nothing behind that claims to be enabled.
            if let Err(rollback) = self.store.delete(D::BUCKET, &id) {
                warn!(bucket = D::BUCKET, id = %id, error = %rollback, "rollback of created record failed");
            }
            return Err(e);
        }
        Ok(id)
    }

    /// Persist an existing record and, when `reconcile` is set, swap its work.
    /// If new work fails to start the record is stored again with its work
    /// disabled, so store and registry still agree.
    fn commit(
        &self,
        registry: &mut Registry<L::Work>,
        device: &mut D,
        reconcile: bool,
        retired: &mut Vec<L::Work>,
    ) -> Result<()> {
        let id = device.id().to_string();
        self.persist(&id, device)?;
        if !reconcile {
            return Ok(());
        }
        if let Err(e) = self.swap_work(registry, device, retired) {
            self.launcher.disable_work(device);
            if let Err(rollback) = self.persist(&id, device) {
                error!(bucket = D::BUCKET, id = %id, error = %rollback, "failed to disable record whose work did not start");
            }
            return Err(e);
        }
        Ok(())
    }

    fn retire(&self, registry: &mut Registry<L::Work>, id: &str, retired: &mut Vec<L::Work>) {
        if let Some(mut work) = registry.take(id) {
            self.launcher.cancel(id, &mut work);
            debug!(bucket = D::BUCKET, id, "work cancelled");
            retired.push(work);
        }
    }

    fn swap_work(
        &self,
        registry: &mut Registry<L::Work>,
        device: &D,
        retired: &mut Vec<L::Work>,
    ) -> Result<()> {
        let id = device.id();
        self.retire(registry, id, retired);
        if self.launcher.wants_work(device) {
            let work = self.launcher.start(device)?;
            registry.insert(id, work);
            debug!(bucket = D::BUCKET, id, "work started");
        }
        Ok(())
    }
}
