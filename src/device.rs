use serde::{Deserialize, Serialize};

const DEFAULT_SETPOINT_MV: u32 = 500_000;
const DEFAULT_SETPOINT_MA: u32 = 10_000;

const MAX_CURRENT_A: f64 = 25.6;
const CAP_VOLTAGE_MAX_V: f64 = 750.0;
const CAP_VOLTAGE_MIN_V: f64 = 100.0;
const RATED_POWER_W: f64 = 15_000.0;

const AMBIENT_TEMPERATURE_C: i8 = 25;

/// Fixed capability constants reported by the module-info command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    pub max_current: f64,
    pub voltage_max: f64,
    pub voltage_min: f64,
    pub rated_power: f64,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            max_current: MAX_CURRENT_A,
            voltage_max: CAP_VOLTAGE_MAX_V,
            voltage_min: CAP_VOLTAGE_MIN_V,
            rated_power: RATED_POWER_W,
        }
    }
}

/// Point-in-time copy of the device, handed to readers outside the
/// receive loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModuleStatus {
    pub module_id: u8,
    pub group_id: u8,
    pub powered_on: bool,
    pub measured_voltage: f64,
    pub measured_current: f64,
    pub setpoint_voltage: f64,
    pub setpoint_current: f64,
    pub ambient_temperature_c: i8,
}

/// Electrical state of one simulated module.
///
/// Setpoints are held in millivolts/milliamps so a fixed-point write reads
/// back unchanged; the float accessors convert on the way out.
#[derive(Debug, Clone)]
pub struct DeviceState {
    module_id: u8,
    group_id: u8,
    powered_on: bool,
    measured_voltage: f64,
    measured_current: f64,
    setpoint_mv: u32,
    setpoint_ma: u32,
    capabilities: Capabilities,
    ambient_temperature_c: i8,
}

impl DeviceState {
    pub fn new(module_id: u8, group_id: u8) -> Self {
        Self {
            module_id,
            group_id,
            powered_on: false,
            measured_voltage: 0.0,
            measured_current: 0.0,
            setpoint_mv: DEFAULT_SETPOINT_MV,
            setpoint_ma: DEFAULT_SETPOINT_MA,
            capabilities: Capabilities::default(),
            ambient_temperature_c: AMBIENT_TEMPERATURE_C,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn module_id(&self) -> u8 {
        self.module_id
    }

    pub fn group_id(&self) -> u8 {
        self.group_id
    }

    pub fn is_powered_on(&self) -> bool {
        self.powered_on
    }

    /// `(volts, amps)`
    pub fn setpoint(&self) -> (f64, f64) {
        (
            f64::from(self.setpoint_mv) / 1000.0,
            f64::from(self.setpoint_ma) / 1000.0,
        )
    }

    /// `(millivolts, milliamps)`
    pub fn setpoint_fixed(&self) -> (u32, u32) {
        (self.setpoint_mv, self.setpoint_ma)
    }

    /// `(volts, amps)`
    pub fn measured(&self) -> (f64, f64) {
        (self.measured_voltage, self.measured_current)
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn ambient_temperature(&self) -> i8 {
        self.ambient_temperature_c
    }

    /// Output rises straight to the setpoint voltage. The simulated load
    /// draws half the current setpoint; this is a simulator policy, not
    /// something the protocol defines.
    pub fn power_on(&mut self) {
        let (voltage, current) = self.setpoint();
        self.powered_on = true;
        self.measured_voltage = voltage;
        self.measured_current = current / 2.0;
    }

    pub fn power_off(&mut self) {
        self.powered_on = false;
        self.measured_voltage = 0.0;
        self.measured_current = 0.0;
    }

    /// Stores a setpoint in volts/amps, rounded to the nearest mV/mA.
    pub fn apply_setpoint(&mut self, voltage: f64, current: f64) {
        self.apply_setpoint_fixed(
            (voltage * 1000.0).round() as u32,
            (current * 1000.0).round() as u32,
        );
    }

    /// Stores a setpoint in millivolts/milliamps. While powered on the
    /// measured voltage follows immediately; measured current is untouched.
    pub fn apply_setpoint_fixed(&mut self, voltage_mv: u32, current_ma: u32) {
        self.setpoint_mv = voltage_mv;
        self.setpoint_ma = current_ma;

        if self.powered_on {
            self.measured_voltage = f64::from(voltage_mv) / 1000.0;
        }
    }

    pub fn status(&self) -> ModuleStatus {
        let (setpoint_voltage, setpoint_current) = self.setpoint();
        ModuleStatus {
            module_id: self.module_id,
            group_id: self.group_id,
            powered_on: self.powered_on,
            measured_voltage: self.measured_voltage,
            measured_current: self.measured_current,
            setpoint_voltage,
            setpoint_current,
            ambient_temperature_c: self.ambient_temperature_c,
        }
    }
}
