//! Optional distance sensor (ultrasonic or time-of-flight).

use crate::configurable::InformationSource;

/// A distance sensor measuring on its own schedule.
///
/// Readings are published through [`InformationSource::information`] as
/// centimetres under the keys `median` and `last`.
pub trait RangeFinder: InformationSource {
    /// Begin periodic measurements.  Idempotent.
    fn start_measurements(&self);

    /// Stop measuring and release the sensor.  Idempotent.
    fn stop_measurements(&self);
}
