// ── Trigger action ──
//
// The read-modify-write applied when a trigger fires: fetch the guest
// config, rewrite one interface's `rate`, push the interface back.

use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{error, info};

use pveshaper_api::{ConfigPatch, PveClient};

use crate::SUCCESS_TARGET;
use crate::compiler::ScheduledAction;
use crate::descriptor::Descriptor;
use crate::error::CoreError;
use crate::trigger::Action;

/// Apply one scheduled rate and return the descriptor that was written.
///
/// Fails with [`CoreError::InterfaceMissing`] without writing anything when
/// the interface is not configured on the guest, and with
/// [`CoreError::Rejected`] when the write succeeds at the HTTP level but is
/// not acknowledged.
pub async fn apply_scheduled_rate(
    client: &PveClient,
    action: &ScheduledAction,
) -> Result<String, CoreError> {
    let guest = &action.guest;
    let current = client
        .get_guest_config(&guest.node, guest.kind, guest.vmid)
        .await?;

    let raw = current
        .interface(&action.interface)
        .ok_or_else(|| CoreError::InterfaceMissing {
            guest: guest.to_string(),
            interface: action.interface.clone(),
        })?;

    let updated = Descriptor::parse(raw).with_rate(action.rate).to_string();
    let mut patch = ConfigPatch::new();
    patch.insert(action.interface.clone(), updated.clone());

    let acknowledged = client
        .update_guest_config(&guest.node, guest.kind, guest.vmid, &patch)
        .await?;
    if !acknowledged {
        return Err(CoreError::Rejected {
            guest: guest.to_string(),
            interface: action.interface.clone(),
        });
    }
    Ok(updated)
}

/// Run [`apply_scheduled_rate`] and log the outcome. Never fails: an error
/// here must not reach the trigger loop or any other guest's action.
pub async fn run_scheduled_rate(client: Arc<PveClient>, action: ScheduledAction) -> bool {
    match apply_scheduled_rate(&client, &action).await {
        Ok(descriptor) => {
            info!(
                target: SUCCESS_TARGET,
                server = %action.server,
                node = %action.guest.node,
                kind = %action.guest.kind,
                vmid = action.guest.vmid,
                interface = %action.interface,
                rate = %action.rate,
                descriptor = %descriptor,
                "bandwidth updated"
            );
            true
        }
        Err(e) => {
            error!(
                server = %action.server,
                node = %action.guest.node,
                kind = %action.guest.kind,
                vmid = action.guest.vmid,
                interface = %action.interface,
                rate = %action.rate,
                error = %e,
                "bandwidth update failed"
            );
            false
        }
    }
}

/// Turn a scheduled action into a trigger action bound to `client`.
pub fn bind(client: Arc<PveClient>, action: ScheduledAction) -> Action {
    Arc::new(move || {
        run_scheduled_rate(Arc::clone(&client), action.clone())
            .map(|_| ())
            .boxed()
    })
}
