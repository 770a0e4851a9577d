//! Location correlation for discovered devices.
//!
//! The discovery pipeline asks the provider for the most recent known fix
//! once per candidate, synchronously. A provider must answer from cached
//! state without blocking; the pipeline never awaits or retries. Two
//! observations of the same device can therefore carry different location
//! fields purely because a fix became available between them.

use crate::domain::models::LocationData;
use std::sync::Mutex;
use tracing::debug;

/// Source of location fixes, started and stopped in lockstep with scanning.
pub trait LocationProvider: Send + Sync {
    /// Begin producing fixes. Called when scanning starts.
    fn start(&self);

    /// Stop producing fixes. Called when scanning stops, including forced
    /// stops.
    fn stop(&self);

    /// The most recent known fix, or `None` if there is none right now.
    /// Must not block.
    fn latest_location(&self) -> Option<LocationData>;
}

/// Provider fed by the integrator rather than a platform service.
///
/// Useful when the host application already runs its own positioning and
/// wants discovered devices tagged with it.
#[derive(Default)]
pub struct ManualLocationProvider {
    current: Mutex<Option<LocationData>>,
}

impl ManualLocationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current fix.
    pub fn set_location(&self, location: LocationData) {
        *self.current.lock().unwrap() = Some(location);
    }

    /// Drops the current fix; subsequent candidates carry no location.
    pub fn clear_location(&self) {
        *self.current.lock().unwrap() = None;
    }
}

impl LocationProvider for ManualLocationProvider {
    fn start(&self) {
        debug!("Started location updates");
    }

    fn stop(&self) {
        debug!("Stopped location updates");
    }

    fn latest_location(&self) -> Option<LocationData> {
        self.current.lock().unwrap().clone()
    }
}

#[cfg(windows)]
pub use windows_provider::WindowsLocationProvider;

#[cfg(windows)]
mod windows_provider {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;
    use tracing::{error, info};
    use windows::Devices::Geolocation::{
        Geolocator, PositionAccuracy, PositionChangedEventArgs,
    };
    use windows::Foundation::TypedEventHandler;

    /// Platform provider backed by the Windows `Geolocator`.
    ///
    /// Caches the latest fix from `PositionChanged` so the discovery
    /// pipeline can read it without touching the geolocation stack.
    pub struct WindowsLocationProvider {
        geolocator: Geolocator,
        current: Arc<Mutex<Option<LocationData>>>,
        token: Mutex<Option<i64>>,
    }

    impl WindowsLocationProvider {
        pub fn new() -> anyhow::Result<Self> {
            let geolocator = Geolocator::new()?;
            geolocator.SetDesiredAccuracy(PositionAccuracy::High)?;

            Ok(Self {
                geolocator,
                current: Arc::new(Mutex::new(None)),
                token: Mutex::new(None),
            })
        }

        fn fix_from_args(args: &PositionChangedEventArgs) -> Option<LocationData> {
            let coordinate = args.Position().ok()?.Coordinate().ok()?;
            let position = coordinate.Point().ok()?.Position().ok()?;

            Some(LocationData {
                latitude: position.Latitude,
                longitude: position.Longitude,
                altitude: Some(position.Altitude),
                horizontal_accuracy: coordinate.Accuracy().ok()?,
                vertical_accuracy: coordinate
                    .AltitudeAccuracy()
                    .ok()
                    .and_then(|reference| reference.Value().ok()),
                timestamp: Utc::now(),
            })
        }
    }

    impl LocationProvider for WindowsLocationProvider {
        fn start(&self) {
            let mut token = self.token.lock().unwrap();
            if token.is_some() {
                return;
            }

            let current = self.current.clone();
            let handler = TypedEventHandler::new(
                move |_: windows::core::Ref<Geolocator>,
                      args: windows::core::Ref<PositionChangedEventArgs>| {
                    if let Some(args) = args.as_ref() {
                        if let Some(fix) = Self::fix_from_args(args) {
                            debug!("Location updated: {}, {}", fix.latitude, fix.longitude);
                            *current.lock().unwrap() = Some(fix);
                        }
                    }
                    Ok(())
                },
            );

            match self.geolocator.PositionChanged(&handler) {
                Ok(registration) => {
                    *token = Some(registration.Value);
                    info!("Started location updates");
                }
                Err(e) => error!("Failed to subscribe to position updates: {e}"),
            }
        }

        fn stop(&self) {
            if let Some(value) = self.token.lock().unwrap().take() {
                let token = windows::Foundation::EventRegistrationToken { Value: value };
                if let Err(e) = self.geolocator.RemovePositionChanged(token) {
                    error!("Failed to unsubscribe from position updates: {e}");
                }
                info!("Stopped location updates");
            }
        }

        fn latest_location(&self) -> Option<LocationData> {
            self.current.lock().unwrap().clone()
        }
    }
}
