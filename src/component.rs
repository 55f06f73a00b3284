// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a controlled subsystem on the controller side.
///
/// A component name doubles as the request target and as the publish-topic
/// key for that subsystem's state snapshots (e.g. `stepper-motor`,
/// `house-light`, `audio-playback`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Component(String);

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Component {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Component {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_is_topic_key() {
        let motor = Component::from("stepper-motor");
        assert_eq!(motor.as_str(), "stepper-motor");
        assert_eq!(motor.to_string(), "stepper-motor");
        assert_eq!(motor, Component::new(String::from("stepper-motor")));
    }
}
