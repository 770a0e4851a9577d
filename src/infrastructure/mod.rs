//! Infrastructure layer: platform radio backends, location sources and
//! logging setup.

pub mod bluetooth;
pub mod location;
pub mod logging;
