//! Virtio resolution: by-id first, name mapping as fallback.

use super::{DevicePathResolver, DeviceReference, IdResolver, MappedResolver, RealDevicePath};
use crate::error::Result;
use tracing::{debug, warn};

/// Resolves with [`IdResolver`]; if the by-id link never shows up, retries
/// with [`MappedResolver`].
///
/// A reference without an id goes straight to [`MappedResolver`]. Otherwise
/// only a timeout triggers the fallback; any other id-lookup failure (udev
/// not runnable, broken link) is returned as is.
pub struct VirtioResolver {
    id: IdResolver,
    mapped: MappedResolver,
}

impl VirtioResolver {
    pub fn new(id: IdResolver, mapped: MappedResolver) -> Self {
        Self { id, mapped }
    }
}

impl DevicePathResolver for VirtioResolver {
    fn resolve(&self, reference: &DeviceReference) -> Result<RealDevicePath> {
        if reference.id.is_none() {
            debug!(reference = %reference, "no disk id, using mapped resolution");
            return self.mapped.resolve(reference);
        }

        match self.id.resolve(reference) {
            Ok(path) => Ok(path),
            Err(e) if e.is_device_not_found() => {
                warn!(
                    reference = %reference,
                    error = %e,
                    "by-id lookup timed out, falling back to mapped resolution"
                );
                self.mapped.resolve(reference)
            }
            Err(e) => Err(e),
        }
    }
}
