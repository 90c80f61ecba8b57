//! `rexbot-hal` – Hardware Abstraction Layer
//!
//! Traits for every piece of hardware the supervisor touches, plus simulated
//! drivers so the whole stack runs on a workstation or in CI.
//!
//! - [`configurable`] – [`Configurable`] / [`InformationSource`]: the
//!   property-map surface exposed over the web transport and persisted to
//!   disk.
//! - [`motors`] – [`MotorsController`] over a [`MotorDriver`], and the
//!   [`ActuatorControl`] stop interface used by the safety watchdog.
//! - [`camera`] – [`VideoSource`], [`Frame`], and the [`ListenerChain`] that
//!   fans frames and errors out to interested parties.
//! - [`board`] – [`Board`]: power and connection-activity LEDs.
//! - [`range`] – [`RangeFinder`]: optional distance sensor.
//! - [`sim`] – in-process stand-ins for all of the above.

pub mod board;
pub mod camera;
pub mod configurable;
pub mod motors;
pub mod range;
pub mod sim;

pub use board::{Board, StatusLed};
pub use camera::{
    CameraSettings, CaptureFormat, ErrorSink, Frame, FrameFormat, FrameSink, ListenerChain,
    VideoListener, VideoSource,
};
pub use configurable::{Configurable, InformationSource, StaticInfo};
pub use motors::{ActuatorControl, MotorDriver, MotorsController};
pub use range::RangeFinder;
