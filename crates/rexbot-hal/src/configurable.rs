//! Property-map surfaces shared by devices, the web transport and the
//! configuration store.

use rexbot_types::{BotError, PropertyMap};

/// A device whose settings can be read and changed by name.
///
/// Implementations validate every value and reject unknown names with
/// [`BotError::UnknownProperty`], so a stale configuration file or a typo in
/// a request never silently changes hardware state.
pub trait Configurable: Send + Sync {
    /// Snapshot of every configurable property.
    fn properties(&self) -> PropertyMap;

    /// Change one property.
    ///
    /// # Errors
    ///
    /// - [`BotError::UnknownProperty`] – no property called `name`.
    /// - [`BotError::InvalidProperty`] – `value` failed validation.
    /// - [`BotError::HardwareFault`] – the device refused the new value.
    fn set_property(&self, name: &str, value: &str) -> Result<(), BotError>;

    /// Read a single property.
    fn property(&self, name: &str) -> Result<String, BotError> {
        self.properties()
            .remove(name)
            .ok_or_else(|| BotError::UnknownProperty(name.to_string()))
    }

    /// Apply every entry of `props` in key order, stopping at the first
    /// failure.  Entries applied before the failure stay applied.
    fn set_properties(&self, props: &PropertyMap) -> Result<(), BotError> {
        for (name, value) in props {
            self.set_property(name, value)?;
        }
        Ok(())
    }
}

/// A read-only informational surface (version, device names, sensor
/// readings).
pub trait InformationSource: Send + Sync {
    fn information(&self) -> PropertyMap;
}

/// Fixed information, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticInfo(PropertyMap);

impl StaticInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }
}

impl InformationSource for StaticInfo {
    fn information(&self) -> PropertyMap {
        self.0.clone()
    }
}

/// Parse an integer property and check it lies in `min..=max`.
pub(crate) fn parse_ranged(name: &str, value: &str, min: i32, max: i32) -> Result<i32, BotError> {
    match value.trim().parse::<i32>() {
        Ok(v) if (min..=max).contains(&v) => Ok(v),
        _ => Err(BotError::invalid(name, value)),
    }
}

/// Parse a boolean property (`true`/`false`/`1`/`0`).
pub(crate) fn parse_flag(name: &str, value: &str) -> Result<bool, BotError> {
    match value.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(BotError::invalid(name, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Knob {
        level: Mutex<i32>,
    }

    impl Configurable for Knob {
        fn properties(&self) -> PropertyMap {
            PropertyMap::from([("level".to_string(), self.level.lock().unwrap().to_string())])
        }

        fn set_property(&self, name: &str, value: &str) -> Result<(), BotError> {
            match name {
                "level" => {
                    *self.level.lock().unwrap() = parse_ranged(name, value, 0, 10)?;
                    Ok(())
                }
                _ => Err(BotError::UnknownProperty(name.to_string())),
            }
        }
    }

    #[test]
    fn property_reads_single_value() {
        let knob = Knob { level: Mutex::new(3) };
        assert_eq!(knob.property("level").unwrap(), "3");
        assert_eq!(
            knob.property("volume"),
            Err(BotError::UnknownProperty("volume".into()))
        );
    }

    #[test]
    fn set_properties_stops_at_first_error() {
        let knob = Knob { level: Mutex::new(3) };
        let props = PropertyMap::from([
            ("level".to_string(), "7".to_string()),
            ("zzz".to_string(), "1".to_string()),
        ]);
        assert!(knob.set_properties(&props).is_err());
        assert_eq!(knob.property("level").unwrap(), "7");
    }

    #[test]
    fn ranged_parser_rejects_out_of_range_and_garbage() {
        assert_eq!(parse_ranged("p", " 5 ", 0, 10), Ok(5));
        assert!(parse_ranged("p", "11", 0, 10).is_err());
        assert!(parse_ranged("p", "five", 0, 10).is_err());
    }

    #[test]
    fn flag_parser_accepts_words_and_digits() {
        assert_eq!(parse_flag("f", "true"), Ok(true));
        assert_eq!(parse_flag("f", "0"), Ok(false));
        assert!(parse_flag("f", "yes").is_err());
    }

    #[test]
    fn static_info_builder() {
        let info = StaticInfo::new().with("product", "rexbot").with("version", "1.0.0");
        let map = info.information();
        assert_eq!(map["product"], "rexbot");
        assert_eq!(map.len(), 2);
    }
}
