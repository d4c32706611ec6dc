//! Fixed vocabularies for enumerated values.
//!
//! Every translation the mapper performs is a lookup in one of these
//! tables. Anything not listed is rejected with a [`MappingError`].

use crate::error::MappingError;

/// A `d_unit` entry.
#[derive(Debug, Clone, Copy)]
pub struct UnitSpec {
    /// `d_unit.id`
    pub id: i32,
    /// Canonical AQMS name, also written back to StationXML
    pub name: &'static str,
    pub description: &'static str,
    /// Other spellings seen in StationXML (matched case-insensitively)
    pub aliases: &'static [&'static str],
}

/// Units recognized in StationXML `InputUnits` / `OutputUnits` /
/// `CalibrationUnits`.
pub const UNITS: &[UnitSpec] = &[
    UnitSpec { id: 1, name: "M", description: "Displacement in meters", aliases: &["METER", "METERS"] },
    UnitSpec { id: 2, name: "M/S", description: "Velocity in meters per second", aliases: &["METER/SECOND", "METERS/SECOND", "M/SEC"] },
    UnitSpec { id: 3, name: "M/S**2", description: "Acceleration in meters per second squared", aliases: &["M/S^2", "M/S/S", "M/SEC**2", "METER/SECOND**2"] },
    UnitSpec { id: 4, name: "COUNTS", description: "Digital counts", aliases: &["COUNT", "DU", "DIGITAL COUNTS"] },
    UnitSpec { id: 5, name: "V", description: "Volts", aliases: &["VOLT", "VOLTS"] },
    UnitSpec { id: 6, name: "A", description: "Amperes", aliases: &["AMPERE", "AMPERES"] },
    UnitSpec { id: 7, name: "PA", description: "Pressure in pascals", aliases: &["PASCAL", "PASCALS"] },
    UnitSpec { id: 8, name: "HPA", description: "Pressure in hectopascals", aliases: &["HECTOPASCALS", "MBAR"] },
    UnitSpec { id: 9, name: "C", description: "Temperature in degrees Celsius", aliases: &["DEGC", "CELSIUS"] },
    UnitSpec { id: 10, name: "K", description: "Temperature in kelvin", aliases: &["KELVIN"] },
    UnitSpec { id: 11, name: "RAD", description: "Angle in radians", aliases: &["RADIAN", "RADIANS"] },
    UnitSpec { id: 12, name: "RAD/S", description: "Angular velocity in radians per second", aliases: &["RADIANS/SECOND"] },
    UnitSpec { id: 13, name: "RAD/S**2", description: "Angular acceleration in radians per second squared", aliases: &["RAD/S^2"] },
    UnitSpec { id: 14, name: "T", description: "Magnetic flux density in teslas", aliases: &["TESLA"] },
    UnitSpec { id: 15, name: "NT", description: "Magnetic flux density in nanoteslas", aliases: &["NANOTESLA"] },
    UnitSpec { id: 16, name: "%", description: "Percent", aliases: &["PERCENT"] },
    UnitSpec { id: 17, name: "W/M**2", description: "Irradiance in watts per square meter", aliases: &["W/M^2"] },
    UnitSpec { id: 18, name: "M**3/M**3", description: "Volumetric water content", aliases: &["M^3/M^3"] },
    UnitSpec { id: 19, name: "DEGREES", description: "Angle in degrees", aliases: &["DEG", "DEGREE"] },
    UnitSpec { id: 20, name: "S", description: "Time in seconds", aliases: &["SEC", "SECOND", "SECONDS"] },
    UnitSpec { id: 21, name: "HZ", description: "Frequency in hertz", aliases: &["HERTZ"] },
    UnitSpec { id: 22, name: "M/M", description: "Strain", aliases: &["STRAIN"] },
];

/// Translate a unit name to its `d_unit` id.
pub fn unit_id(entity: &str, field: &'static str, name: &str) -> Result<i32, MappingError> {
    let wanted = name.trim().to_ascii_uppercase();
    UNITS
        .iter()
        .find(|u| u.name == wanted || u.aliases.contains(&wanted.as_str()))
        .map(|u| u.id)
        .ok_or_else(|| MappingError::unrecognized(entity, field, name))
}

/// Translate a `d_unit` id back to its canonical name.
pub fn unit_name(entity: &str, field: &'static str, id: i32) -> Result<&'static str, MappingError> {
    UNITS
        .iter()
        .find(|u| u.id == id)
        .map(|u| u.name)
        .ok_or_else(|| MappingError::unrecognized(entity, field, &id.to_string()))
}

/// `(id, name, description)` rows for seeding `d_unit`.
pub fn unit_seed_rows() -> Vec<(i32, &'static str, &'static str)> {
    UNITS.iter().map(|u| (u.id, u.name, u.description)).collect()
}

/// SEED band codes (first letter of a channel code).
pub const BAND_CODES: &[(char, &str)] = &[
    ('F', ">= 1000 to < 5000 Hz, corner >= 10 s"),
    ('G', ">= 1000 to < 5000 Hz, corner < 10 s"),
    ('D', ">= 250 to < 1000 Hz, corner < 10 s"),
    ('C', ">= 250 to < 1000 Hz, corner >= 10 s"),
    ('E', "Extremely short period, >= 80 to < 250 Hz"),
    ('S', "Short period, >= 10 to < 80 Hz"),
    ('H', "High broad band, >= 80 to < 250 Hz"),
    ('B', "Broad band, >= 10 to < 80 Hz"),
    ('M', "Mid period, > 1 to < 10 Hz"),
    ('L', "Long period, ~ 1 Hz"),
    ('V', "Very long period, ~ 0.1 Hz"),
    ('U', "Ultra long period, ~ 0.01 Hz"),
    ('R', "Extremely long period, >= 0.0001 to < 0.001 Hz"),
    ('P', "On the order of 0.1 to 1 day"),
    ('T', "On the order of 1 to 10 days"),
    ('Q', "Greater than 10 days"),
    ('A', "Administrative instrument channel"),
    ('O', "Opaque instrument channel"),
];

/// SEED instrument codes (second letter).
pub const INSTRUMENT_CODES: &[(char, &str)] = &[
    ('H', "High gain seismometer"),
    ('L', "Low gain seismometer"),
    ('G', "Gravimeter"),
    ('M', "Mass position seismometer"),
    ('N', "Accelerometer"),
    ('P', "Geophone"),
    ('A', "Tilt meter"),
    ('B', "Creep meter"),
    ('C', "Calibration input"),
    ('D', "Pressure"),
    ('E', "Electronic test point"),
    ('F', "Magnetometer"),
    ('I', "Humidity"),
    ('J', "Rotational sensor"),
    ('K', "Temperature"),
    ('O', "Water current"),
    ('R', "Rainfall"),
    ('S', "Linear strain"),
    ('T', "Tide"),
    ('U', "Bolometer"),
    ('V', "Volumetric strain"),
    ('W', "Wind"),
    ('X', "Derived or generated channel"),
    ('Y', "Non-specific instruments"),
    ('Z', "Synthesized beams"),
];

/// SEED orientation codes (third letter).
pub const ORIENTATION_CODES: &[(char, &str)] = &[
    ('Z', "Vertical"),
    ('N', "North-south"),
    ('E', "East-west"),
    ('A', "Triaxial A"),
    ('B', "Triaxial B"),
    ('C', "Triaxial C"),
    ('T', "Transverse"),
    ('R', "Radial"),
    ('1', "Orthogonal, non-traditional 1"),
    ('2', "Orthogonal, non-traditional 2"),
    ('3', "Orthogonal, non-traditional 3"),
    ('U', "Optional component U"),
    ('V', "Optional component V"),
    ('W', "Optional component W"),
    ('H', "Hydrophone or outside"),
    ('F', "Pressure, infrasound"),
    ('I', "Inside"),
    ('O', "Outside"),
    ('D', "Differential"),
    ('G', "Gravity"),
    ('K', "Temperature"),
    ('S', "Scalar"),
];

/// Validate the three letters of a SEED channel code.
pub fn validate_channel_code(entity: &str, code: &str) -> Result<(), MappingError> {
    let letters: Vec<char> = code.chars().collect();
    if letters.len() != 3 {
        return Err(MappingError::new(
            entity,
            "channel_code",
            code,
            "expected three characters",
        ));
    }

    let tables: [(&'static str, &[(char, &str)]); 3] = [
        ("band_code", BAND_CODES),
        ("instrument_code", INSTRUMENT_CODES),
        ("orientation_code", ORIENTATION_CODES),
    ];
    for (letter, (field, table)) in letters.iter().zip(tables) {
        if !table.iter().any(|(c, _)| c == letter) {
            return Err(MappingError::unrecognized(entity, field, &letter.to_string()));
        }
    }
    Ok(())
}

/// StationXML `PzTransferFunctionType` → AQMS code.
pub const PZ_TRANSFER_TYPES: &[(&str, &str)] = &[
    ("LAPLACE (RADIANS/SECOND)", "A"),
    ("LAPLACE (HERTZ)", "B"),
    ("DIGITAL (Z-TRANSFORM)", "D"),
];

/// StationXML `CfTransferFunctionType` → AQMS code.
pub const CF_TRANSFER_TYPES: &[(&str, &str)] = &[
    ("ANALOG (RADIANS/SECOND)", "A"),
    ("ANALOG (HERTZ)", "B"),
    ("DIGITAL", "D"),
];

/// StationXML FIR `Symmetry` → AQMS code.
pub const FIR_SYMMETRY: &[(&str, &str)] = &[("NONE", "A"), ("ODD", "B"), ("EVEN", "C")];

/// Forward lookup, case-insensitive on the StationXML side.
pub fn to_code(
    table: &[(&'static str, &'static str)],
    entity: &str,
    field: &'static str,
    value: &str,
) -> Result<String, MappingError> {
    let wanted = value.trim().to_ascii_uppercase();
    table
        .iter()
        .find(|(name, _)| *name == wanted)
        .map(|(_, code)| code.to_string())
        .ok_or_else(|| MappingError::unrecognized(entity, field, value))
}

/// Reverse lookup from AQMS code to the StationXML spelling.
pub fn from_code(
    table: &[(&'static str, &'static str)],
    entity: &str,
    field: &'static str,
    code: &str,
) -> Result<String, MappingError> {
    table
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(name, _)| name.to_string())
        .ok_or_else(|| MappingError::unrecognized(entity, field, code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_unit_aliases_are_case_insensitive() {
        assert_eq!(unit_id("x", "input_units", "m/s").unwrap(), 2);
        assert_eq!(unit_id("x", "input_units", "count").unwrap(), 4);
        assert_eq!(unit_id("x", "input_units", " M/S**2 ").unwrap(), 3);
    }

    #[test]
    fn test_unknown_unit_names_field_and_value() {
        let err = unit_id("UW.RATT..EHZ", "input_units", "furlongs").unwrap_err();
        assert_eq!(err.field, "input_units");
        assert_eq!(err.value, "furlongs");
        assert_eq!(err.entity, "UW.RATT..EHZ");
    }

    #[test]
    fn test_unit_ids_and_names_are_unique() {
        let ids: HashSet<_> = UNITS.iter().map(|u| u.id).collect();
        assert_eq!(ids.len(), UNITS.len());

        let mut spellings = HashSet::new();
        for unit in UNITS {
            assert!(spellings.insert(unit.name), "duplicate {}", unit.name);
            for alias in unit.aliases {
                assert!(spellings.insert(*alias), "duplicate alias {}", alias);
            }
        }
    }

    #[test]
    fn test_channel_code_letters() {
        assert!(validate_channel_code("x", "EHZ").is_ok());
        assert!(validate_channel_code("x", "HN1").is_ok());

        let err = validate_channel_code("x", "EHQ").unwrap_err();
        assert_eq!(err.field, "orientation_code");
        assert_eq!(err.value, "Q");

        let err = validate_channel_code("x", "EH").unwrap_err();
        assert_eq!(err.field, "channel_code");
    }

    #[test]
    fn test_transfer_codes_round_trip() {
        for table in [PZ_TRANSFER_TYPES, CF_TRANSFER_TYPES, FIR_SYMMETRY] {
            for (name, code) in table {
                assert_eq!(to_code(table, "x", "f", name).unwrap(), *code);
                assert_eq!(from_code(table, "x", "f", code).unwrap(), *name);
            }
        }
        assert!(to_code(PZ_TRANSFER_TYPES, "x", "f", "LAPLACE (FURLONGS)").is_err());
    }
}
