//! NBD image rebuild.
//!
//! When the clients boot over NBD they see a compressed image built from the
//! chroot, so changes to the chroot only reach the Pis after
//! `ltsp-update-image` has run. `NBDBuildNeeded=true` in `/etc/pinet` marks
//! an image as stale.

use anyhow::Result;
use tracing::info;

use crate::context::PinetContext;
use crate::dialog::Dialog;
use crate::shell::{CommandRunner, ErrorPolicy, run_with_recovery};

/// What [`rebuild_image`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// The image was rebuilt and marked current
    Rebuilt,
    /// NBD is in use but automatic compression is off; the operator was told
    AutoCompressionDisabled,
    /// The server does not use NBD
    NotUsingNbd,
    /// The rebuild failed and the operator chose to continue
    Failed,
}

/// Record that the chroot changed and the image is stale.
pub async fn mark_rebuild_needed(ctx: &PinetContext) -> Result<()> {
    ctx.store.set("NBDBuildNeeded", "true").await
}

/// Rebuild the NBD image if the server uses NBD with auto compression.
pub async fn rebuild_image<R, D>(ctx: &PinetContext, runner: &R, dialog: &D) -> Result<RebuildOutcome>
where
    R: CommandRunner,
    D: Dialog,
{
    if !ctx.store.get_flag("NBD").await? {
        return Ok(RebuildOutcome::NotUsingNbd);
    }

    if !ctx.store.get_flag("NBDuse").await? {
        dialog
            .message(
                "WARNING",
                "Auto NBD compressing is disabled. For your changes to reach the Raspberry Pis, run NBD-recompress from the main menu.",
            )
            .await?;
        return Ok(RebuildOutcome::AutoCompressionDisabled);
    }

    info!("Compressing the image, this will take roughly 5 minutes");
    let command = ctx
        .host_command("ltsp-update-image")
        .arg(ctx.settings.chroot_path.display().to_string())
        .inherit_stdio()
        .with_context("nbd image");

    if !run_with_recovery(runner, dialog, command, ErrorPolicy::Ask).await?.succeeded() {
        return Ok(RebuildOutcome::Failed);
    }

    ctx.store.set("NBDBuildNeeded", "false").await?;
    Ok(RebuildOutcome::Rebuilt)
}
