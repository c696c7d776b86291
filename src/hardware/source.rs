use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use crate::error::{error_codes, KeyLifecycleError, KeyLifecycleResult};
use crate::utils;

/// Opaque reference to a key held inside a hardware key source
///
/// The raw private key never leaves the device; all operations go through the
/// owning [`HardwareKeySource`] with this handle.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct HardwareKeyHandle {
    id: String,
}

impl HardwareKeyHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// The device-scoped identifier of the underlying key object
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Debug for HardwareKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HardwareKeyHandle")
            .field("id", &self.id)
            .finish()
    }
}

/// A tamper-resistant key-generation facility
///
/// Contract:
/// * `generate` creates a fresh key inside the device and returns its handle
/// * `export_public_material` is deterministic per handle: the same handle
///   always yields the same bytes, which is what makes key derivation stable
///   across process restarts
/// * `destroy` removes the key object; destroying an unknown handle fails
/// * `is_available` probes whether the platform offers the capability at all
pub trait HardwareKeySource: Send + Sync {
    /// Check whether the hardware capability is present on this platform
    fn is_available(&self) -> bool;

    /// Generate a fresh key inside the device
    fn generate(&self) -> KeyLifecycleResult<HardwareKeyHandle>;

    /// Export the public material for a generated key
    fn export_public_material(&self, handle: &HardwareKeyHandle) -> KeyLifecycleResult<Vec<u8>>;

    /// Destroy the key object behind the handle
    fn destroy(&self, handle: &HardwareKeyHandle) -> KeyLifecycleResult<()>;
}

/// Software implementation of [`HardwareKeySource`]
///
/// Primarily for testing and for platforms without a hardware facility, in
/// the same spirit as running against SoftHSM. Key material is random per
/// generated handle and the exported public material is stable for the
/// lifetime of the process.
pub struct SoftwareKeySource {
    keys: RwLock<HashMap<String, Vec<u8>>>,
    available: bool,
    counter: RwLock<u64>,
}

impl SoftwareKeySource {
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
            available: true,
            counter: RwLock::new(0),
        }
    }

    /// Create a source whose availability probe always fails
    ///
    /// Lets tests exercise the `HardwareUnavailable` path without a platform
    /// that actually lacks the capability.
    pub fn unavailable() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
            available: false,
            counter: RwLock::new(0),
        }
    }

    /// Number of live key objects
    pub fn key_count(&self) -> usize {
        self.keys.read().expect("key source lock poisoned").len()
    }
}

impl Default for SoftwareKeySource {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareKeySource for SoftwareKeySource {
    fn is_available(&self) -> bool {
        self.available
    }

    fn generate(&self) -> KeyLifecycleResult<HardwareKeyHandle> {
        if !self.available {
            return Err(KeyLifecycleError::hardware_unavailable(
                "software key source configured as unavailable",
            ));
        }

        let material = utils::random_bytes(32)?;

        let mut counter = self.counter.write().expect("key source lock poisoned");
        *counter += 1;
        let id = format!("software-key-{}", *counter);

        self.keys
            .write()
            .expect("key source lock poisoned")
            .insert(id.clone(), material);

        Ok(HardwareKeyHandle::new(id))
    }

    fn export_public_material(&self, handle: &HardwareKeyHandle) -> KeyLifecycleResult<Vec<u8>> {
        self.keys
            .read()
            .expect("key source lock poisoned")
            .get(handle.id())
            .cloned()
            .ok_or_else(|| KeyLifecycleError::DerivationFailed {
                operation: "export_public_material".to_string(),
                cause: format!("unknown key handle '{}'", handle.id()),
                error_code: error_codes::HARDWARE_KEY_GENERATION_FAILED,
            })
    }

    fn destroy(&self, handle: &HardwareKeyHandle) -> KeyLifecycleResult<()> {
        let removed = self
            .keys
            .write()
            .expect("key source lock poisoned")
            .remove(handle.id());

        if removed.is_none() {
            return Err(KeyLifecycleError::DerivationFailed {
                operation: "destroy".to_string(),
                cause: format!("unknown key handle '{}'", handle.id()),
                error_code: error_codes::HARDWARE_KEY_GENERATION_FAILED,
            });
        }

        Ok(())
    }
}
