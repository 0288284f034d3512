// dh-core/src/units.rs

use uom::si::f64::{
    Area as UomArea, Energy as UomEnergy, Length as UomLength, MassRate as UomMassRate,
    Power as UomPower, TemperatureInterval as UomTemperatureInterval,
    ThermodynamicTemperature as UomThermodynamicTemperature, Time as UomTime,
    Velocity as UomVelocity,
};

// Public canonical unit types (SI, f64)
pub type Area = UomArea;
pub type Energy = UomEnergy;
pub type Length = UomLength;
pub type MassRate = UomMassRate;
pub type Power = UomPower;
pub type TempInterval = UomTemperatureInterval;
pub type Temperature = UomThermodynamicTemperature;
pub type Time = UomTime;
pub type Velocity = UomVelocity;

#[inline]
pub fn k(v: f64) -> Temperature {
    use uom::si::thermodynamic_temperature::kelvin;
    Temperature::new::<kelvin>(v)
}

#[inline]
pub fn celsius(v: f64) -> Temperature {
    use uom::si::thermodynamic_temperature::degree_celsius;
    Temperature::new::<degree_celsius>(v)
}

#[inline]
pub fn kgps(v: f64) -> MassRate {
    use uom::si::mass_rate::kilogram_per_second;
    MassRate::new::<kilogram_per_second>(v)
}

#[inline]
pub fn m(v: f64) -> Length {
    use uom::si::length::meter;
    Length::new::<meter>(v)
}

#[inline]
pub fn mm(v: f64) -> Length {
    use uom::si::length::millimeter;
    Length::new::<millimeter>(v)
}

#[inline]
pub fn s(v: f64) -> Time {
    use uom::si::time::second;
    Time::new::<second>(v)
}

#[inline]
pub fn hours(v: f64) -> Time {
    use uom::si::time::hour;
    Time::new::<hour>(v)
}

#[inline]
pub fn mps(v: f64) -> Velocity {
    use uom::si::velocity::meter_per_second;
    Velocity::new::<meter_per_second>(v)
}

#[inline]
pub fn watt(v: f64) -> Power {
    use uom::si::power::watt;
    Power::new::<watt>(v)
}

pub mod constants {
    use super::*;

    /// Specific heat of water (J/kg/K).
    pub const CP_WATER: f64 = 4180.0;
    /// Density of water (kg/m3).
    pub const RHO_WATER: f64 = 1000.0;
    /// Joules per kilowatt hour.
    pub const J_PER_KWH: f64 = 3.6e6;
    /// Offset between kelvin and degrees Celsius.
    pub const ZERO_CELSIUS_K: f64 = 273.15;

    #[inline]
    pub fn freezing_point() -> Temperature {
        k(ZERO_CELSIUS_K)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_smoke() {
        let _t = k(300.0);
        let _mdot = kgps(1.2);
        let _l = m(2.0);
        let _dt = s(0.1);
        let _v = mps(3.0);
        let _q = watt(1.0e3);
        let _t0 = constants::freezing_point();
    }

    #[test]
    fn celsius_is_offset_kelvin() {
        let t = celsius(60.0);
        assert!((t.value - 333.15).abs() < 1e-9);
        assert!((mm(200.0).value - 0.2).abs() < 1e-12);
        assert!((hours(1.0).value - 3600.0).abs() < 1e-9);
    }
}
