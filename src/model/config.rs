//! The configuration document collected by the form.
//!
//! Field names mirror the JSON the simulator reads, so several of them
//! (`inSameComputer`, `endpoint_to_ddbb`, `type`) keep their wire spelling.

use crate::identifier::HouseId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigDocument {
    pub basic_parameters: BasicParameters,
    pub solar_panels: SolarPanels,
    pub battery: Battery,
    pub water_heating: WaterHeating,
    pub remote_connection: RemoteConnection,
    pub water_devices: Vec<WaterDevice>,
    pub electricity_devices: Vec<ElectricityDevice>,
}

impl ConfigDocument {
    /// Identifier derived from the house name.
    pub fn house_id(&self) -> HouseId {
        HouseId::from_house_name(&self.basic_parameters.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicParameters {
    pub name: String,
    pub age_options: Vec<String>,
    pub number_of_people: u32,
    pub npc: Vec<Npc>,
    /// Bedrooms + bathrooms + kitchens.
    pub rooms: u32,
    pub bathrooms: u32,
    pub kitchen: u32,
    pub living_room: u32,
    pub dining_room: u32,
    pub garage: u32,
    pub garden: u32,
    pub type_of_simulation: TypeOfSimulation,
}

impl Default for BasicParameters {
    fn default() -> Self {
        Self {
            name: "Default House".into(),
            age_options: AgeGroup::ALL.iter().map(|a| a.as_str().to_string()).collect(),
            number_of_people: 0,
            npc: Vec::new(),
            rooms: 0,
            bathrooms: 0,
            kitchen: 0,
            living_room: 1,
            dining_room: 1,
            garage: 1,
            garden: 1,
            type_of_simulation: TypeOfSimulation::default(),
        }
    }
}

impl BasicParameters {
    /// Fill `rooms` the way the form does.
    pub fn with_room_counts(mut self, bedrooms: u32, bathrooms: u32, kitchens: u32) -> Self {
        self.bathrooms = bathrooms;
        self.kitchen = kitchens;
        self.rooms = bedrooms.saturating_add(bathrooms).saturating_add(kitchens);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Npc {
    pub name: String,
    pub age_group: AgeGroup,
    pub out_of_home_periods: Vec<OutOfHomePeriod>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeGroup {
    Child,
    Teenager,
    Adult,
    Elderly,
    // The form sends an empty string when nothing was picked.
    #[default]
    #[serde(rename = "")]
    Unset,
}

impl AgeGroup {
    pub const ALL: [AgeGroup; 4] = [
        AgeGroup::Child,
        AgeGroup::Teenager,
        AgeGroup::Adult,
        AgeGroup::Elderly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AgeGroup::Child => "child",
            AgeGroup::Teenager => "teenager",
            AgeGroup::Adult => "adult",
            AgeGroup::Elderly => "elderly",
            AgeGroup::Unset => "",
        }
    }
}

/// A time window the occupant is away. Times are kept as the form's strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutOfHomePeriod {
    pub start: String,
    pub end: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeOfSimulation {
    #[serde(rename = "type")]
    pub kind: SimulationType,
    pub start_date: String,
    pub end_date: String,
    pub options: Vec<SimulationType>,
}

impl Default for TypeOfSimulation {
    fn default() -> Self {
        Self {
            kind: SimulationType::FastForward,
            start_date: "2021-01-01".into(),
            end_date: "2021-01-02".into(),
            options: vec![SimulationType::RealTime, SimulationType::FastForward],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationType {
    RealTime,
    #[default]
    FastForward,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolarPanels {
    pub panel_eff: f64,
    pub number_of_panels: u32,
    pub size_of_panels_m2: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Battery {
    pub capacity_ah: f64,
    pub voltage: f64,
    pub initial_state_of_charge_percent: f64,
    pub charging_efficiency: f64,
    pub discharging_efficiency: f64,
    pub energy_loss_conversion: f64,
    pub degrading_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterHeating {
    pub selected_method: WaterHeatingMethod,
    pub options: Vec<WaterHeatingMethod>,
}

impl Default for WaterHeating {
    fn default() -> Self {
        Self {
            selected_method: WaterHeatingMethod::Electricity,
            options: WaterHeatingMethod::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaterHeatingMethod {
    #[default]
    #[serde(rename = "electricity")]
    Electricity,
    #[serde(rename = "natural gas")]
    NaturalGas,
    #[serde(rename = "propane")]
    Propane,
    #[serde(rename = "fossil fuel")]
    FossilFuel,
}

impl WaterHeatingMethod {
    pub const ALL: [WaterHeatingMethod; 4] = [
        WaterHeatingMethod::Electricity,
        WaterHeatingMethod::NaturalGas,
        WaterHeatingMethod::Propane,
        WaterHeatingMethod::FossilFuel,
    ];
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConnection {
    #[serde(rename = "inSameComputer")]
    pub in_same_computer: bool,
    pub endpoint_to_ddbb: String,
    pub username: String,
    pub password: String,
    pub not_local_params: NotLocalParams,
}

// Hand-written so credentials never end up in logs.
impl fmt::Debug for RemoteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConnection")
            .field("in_same_computer", &self.in_same_computer)
            .field("endpoint_to_ddbb", &self.endpoint_to_ddbb)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("not_local_params", &self.not_local_params)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotLocalParams {
    pub remote_brok_ip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterDevice {
    pub device: String,
    pub room: String,
    pub flow_rate_liters_per_minute: f64,
    /// `[min, max]` minutes per use.
    pub typical_duration: [f64; 2],
    pub max_uses_per_day: u32,
    pub usage_patterns: UsagePatterns,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElectricityDevice {
    pub device: String,
    pub room: String,
    pub power_watts: f64,
    pub typical_duration: [f64; 2],
    pub max_uses_per_day: u32,
    pub usage_patterns: UsagePatterns,
}

/// Relative usage weight per time of day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsagePatterns {
    pub morning: f64,
    pub midday: f64,
    pub dinner: f64,
    pub evening: f64,
    pub other: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_form_gets_form_defaults() {
        let doc: ConfigDocument = serde_json::from_str(
            r#"{ "basic_parameters": { "name": "Test House", "number_of_people": 2 } }"#,
        )
        .unwrap();
        assert_eq!(doc.basic_parameters.name, "Test House");
        assert_eq!(doc.basic_parameters.garden, 1);
        assert_eq!(
            doc.basic_parameters.type_of_simulation.kind,
            SimulationType::FastForward
        );
        assert_eq!(doc.water_heating.selected_method, WaterHeatingMethod::Electricity);
        assert_eq!(doc.house_id().as_str(), "test_house");
    }

    #[test]
    fn wire_names_are_preserved() {
        let mut doc = ConfigDocument::default();
        doc.remote_connection.in_same_computer = true;
        doc.water_heating.selected_method = WaterHeatingMethod::NaturalGas;
        doc.basic_parameters.npc.push(Npc {
            name: "Ana".into(),
            age_group: AgeGroup::Unset,
            out_of_home_periods: vec![],
        });
        let v = serde_json::to_value(&doc).unwrap();
        assert_eq!(v["remote_connection"]["inSameComputer"], true);
        assert_eq!(v["water_heating"]["selected_method"], "natural gas");
        assert_eq!(v["basic_parameters"]["type_of_simulation"]["type"], "fast_forward");
        assert_eq!(v["basic_parameters"]["npc"][0]["age_group"], "");
        assert_eq!(
            v["basic_parameters"]["age_options"],
            serde_json::json!(["child", "teenager", "adult", "elderly"])
        );
    }

    #[test]
    fn room_total_sums_inputs() {
        let p = BasicParameters::default().with_room_counts(3, 2, 1);
        assert_eq!((p.rooms, p.bathrooms, p.kitchen), (6, 2, 1));
    }

    #[test]
    fn room_total_saturates() {
        let p = BasicParameters::default().with_room_counts(u32::MAX, 2, 1);
        assert_eq!(p.rooms, u32::MAX);
    }

    #[test]
    fn debug_hides_password() {
        let rc = RemoteConnection {
            password: "hunter2".into(),
            ..Default::default()
        };
        let s = format!("{rc:?}");
        assert!(!s.contains("hunter2"));
        assert!(s.contains("***"));
    }
}
