//! Monitor model definitions.
//!
//! # Purpose
//! Defines the parts of a monitor the admission workflow inspects: enablement,
//! schema version, search inputs, and trigger actions with their throttle and
//! destination. Trigger conditions and input queries are carried opaquely.
use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default, PartialEq)]
pub struct Monitor {
    pub name: String,
    pub enabled: bool,
    /// Epoch milliseconds of the enable event that is still in effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_time: Option<u64>,
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default)]
    pub inputs: Vec<MonitorInput>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MonitorInput {
    Search(SearchInput),
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct SearchInput {
    pub indices: Vec<String>,
    #[serde(default)]
    pub query: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default, PartialEq)]
pub struct Trigger {
    pub name: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub condition: serde_json::Value,
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default, PartialEq)]
pub struct Action {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_id: Option<String>,
    #[serde(default)]
    pub throttle_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle: Option<Throttle>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    pub value: u64,
    pub unit: ThrottleUnit,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThrottleUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl ThrottleUnit {
    fn seconds(self) -> u64 {
        match self {
            ThrottleUnit::Seconds => 1,
            ThrottleUnit::Minutes => 60,
            ThrottleUnit::Hours => 60 * 60,
            ThrottleUnit::Days => 24 * 60 * 60,
        }
    }
}

impl Throttle {
    pub fn new(value: u64, unit: ThrottleUnit) -> Self {
        Self { value, unit }
    }

    /// Normalized throttle period, or `None` if it does not fit a `Duration`.
    pub fn duration(&self) -> Option<Duration> {
        self.value
            .checked_mul(self.unit.seconds())
            .map(Duration::from_secs)
    }
}

impl Monitor {
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.triggers
            .iter()
            .flat_map(|trigger| trigger.actions.iter())
    }

    pub fn search_inputs(&self) -> impl Iterator<Item = &SearchInput> {
        self.inputs.iter().map(|input| match input {
            MonitorInput::Search(search) => search,
        })
    }

    /// Keeps the original enable event across updates of a monitor that stays
    /// enabled.
    pub fn reconcile_enabled_time(&mut self, previous: &Monitor) {
        if self.enabled && previous.enabled {
            self.enabled_time = previous.enabled_time;
        }
    }

    /// An enabled monitor always carries an enable time; a disabled one never
    /// does.
    pub fn normalize_enabled_time(&mut self, now_millis: u64) {
        if !self.enabled {
            self.enabled_time = None;
        } else if self.enabled_time.is_none() {
            self.enabled_time = Some(now_millis);
        }
    }
}
