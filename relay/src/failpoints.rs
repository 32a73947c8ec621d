use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, RelayResult};

pub const RECONCILE_BEFORE_EMIT: &str = "reconcile.before_emit";
pub const RECONCILE_BEFORE_CHECKPOINT_FLUSH: &str = "reconcile.before_checkpoint_flush";

/// Fails with an error of the kind named by the failpoint parameter when the failpoint is on.
///
/// Compiles to `Ok(())` unless the `failpoints` feature is enabled.
pub fn relay_fail_point(name: &str) -> RelayResult<()> {
    fail_point!(name, |parameter| {
        let error_kind = match parameter.as_deref() {
            Some("emit") => ErrorKind::EventLogEmitFailed,
            Some("checkpoint") => ErrorKind::CheckpointIoError,
            Some("read") => ErrorKind::SourceReadFailed,
            _ => ErrorKind::FailpointTriggered,
        };

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
