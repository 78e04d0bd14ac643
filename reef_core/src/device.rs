//! Capability traits shared by both device families.
//!
//! A [`Device`] is a persisted record; a [`Launcher`] turns a record into live
//! background work (a polling thread, a scheduler job) and tears it down again.
//! The generic [`Controller`](crate::controller::Controller) only talks to
//! these two traits.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;

pub trait Device: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Store bucket holding records of this family.
    const BUCKET: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: &str);
    fn name(&self) -> &str;

    /// Family-specific checks run before every create and update.
    fn validate(&self) -> Result<()>;
}

pub trait Launcher<D: Device>: Send + Sync {
    /// Handle to whatever runs on behalf of one device.
    type Work: Send;

    /// Whether `Update` reconciles background work. Families whose work is
    /// owned by a dedicated operation (pump schedules) opt out.
    const RECONCILE_ON_UPDATE: bool = true;

    /// Whether this record should have background work at all.
    fn wants_work(&self, device: &D) -> bool;

    /// Clear whatever makes `wants_work` true. Used to persist a record whose
    /// work failed to start.
    fn disable_work(&self, device: &mut D);

    fn start(&self, device: &D) -> Result<Self::Work>;

    /// Signal `work` to stop. Called with the registry lock held, so it must
    /// not block; anything slow belongs in the work's `Drop`.
    fn cancel(&self, id: &str, work: &mut Self::Work);

    /// Called once a record's work is cancelled and the record is gone from
    /// the store.
    fn on_delete(&self, _id: &str) {}
}
