//! Pass-through resolution.

use super::{DevicePathResolver, DeviceReference, RealDevicePath};
use crate::error::Result;

/// Returns the configured path unchanged.
///
/// Used when the guest already sees the final device paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityResolver;

impl DevicePathResolver for IdentityResolver {
    fn resolve(&self, reference: &DeviceReference) -> Result<RealDevicePath> {
        Ok(RealDevicePath::new(&reference.path))
    }
}
