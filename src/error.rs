//! Error taxonomy for the BLE SDK.
//!
//! Errors are delivered to the caller through the `ErrorEncountered`
//! callback, never as return values or panics from the public command
//! surface. Expected conditions (starting while already scanning, stopping
//! while stopped, starting while the radio is not ready) are logged no-ops
//! and do not reach this type.

use thiserror::Error;

/// Errors the SDK can report through the error callback.
///
/// Only [`BleSdkError::BluetoothPoweredOff`] is raised by the core control
/// flow today: it accompanies the forced stop when the radio loses power
/// mid-scan. The remaining variants are reserved for adapter backends that
/// can detect the corresponding platform condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BleSdkError {
    /// Bluetooth radio lost power while scanning. Raised by the core.
    #[error("Bluetooth is powered off")]
    BluetoothPoweredOff,

    /// The application is not authorized to use Bluetooth. Reserved for
    /// adapters that surface authorization state.
    #[error("Bluetooth access is not authorized")]
    BluetoothUnauthorized,

    /// Bluetooth Low Energy is not supported on this machine. Reserved.
    #[error("Bluetooth is not supported on this device")]
    BluetoothUnsupported,

    /// Location services are disabled system-wide. Reserved for location
    /// providers that can detect it.
    #[error("Location services are disabled")]
    LocationServicesDisabled,

    /// The application is not authorized to access location. Reserved.
    #[error("Location access is not authorized")]
    LocationUnauthorized,

    /// The scan operation failed inside the radio stack. Reserved.
    #[error("BLE scanning failed")]
    ScanningFailed,

    /// The supplied configuration is invalid. Reserved.
    #[error("SDK configuration is invalid")]
    ConfigurationInvalid,
}
