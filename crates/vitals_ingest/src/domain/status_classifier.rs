use common::domain::{NormalizedReading, Status};
use serde_json::Value;

/// Open interval of acceptable values; a bound that is `None` never trips
#[derive(Debug, Clone, Copy)]
struct Limits {
    below: Option<f64>,
    above: Option<f64>,
}

impl Limits {
    const fn new(below: Option<f64>, above: Option<f64>) -> Self {
        Self { below, above }
    }

    /// Strict comparison: a value equal to a bound is within limits
    fn breached_by(&self, value: Option<f64>) -> bool {
        let Some(value) = value else {
            return false;
        };
        self.below.is_some_and(|low| value < low) || self.above.is_some_and(|high| value > high)
    }
}

/// One classification tier. Any single breached limit selects the tier.
#[derive(Debug, Clone, Copy)]
struct Tier {
    status: Status,
    heart_rate: Limits,
    patient_temperature: Limits,
    o2_saturation: Limits,
}

/// Tier thresholds. When several tiers are breached the most severe status wins.
const TIERS: [Tier; 2] = [
    Tier {
        status: Status::Critical,
        heart_rate: Limits::new(Some(40.0), Some(140.0)),
        patient_temperature: Limits::new(None, Some(39.5)),
        o2_saturation: Limits::new(Some(88.0), None),
    },
    Tier {
        status: Status::Warning,
        heart_rate: Limits::new(Some(50.0), Some(120.0)),
        patient_temperature: Limits::new(None, Some(38.5)),
        o2_saturation: Limits::new(Some(94.0), None),
    },
];

/// The three vitals that drive classification. Room conditions never do.
#[derive(Debug, Clone, Copy)]
struct Vitals {
    heart_rate: Option<f64>,
    patient_temperature: Option<f64>,
    o2_saturation: Option<f64>,
}

impl Vitals {
    fn from_reading(reading: &NormalizedReading) -> Self {
        Self {
            heart_rate: numeric(&reading.heart_rate),
            patient_temperature: numeric(&reading.patient_temperature),
            o2_saturation: numeric(&reading.o2_saturation),
        }
    }

    fn any_missing(&self) -> bool {
        self.heart_rate.is_none() || self.patient_temperature.is_none() || self.o2_saturation.is_none()
    }
}

// Non-numeric values count as missing
fn numeric(value: &Value) -> Option<f64> {
    value.as_f64()
}

/// Derive the clinical status of a reading
pub fn classify(reading: &NormalizedReading) -> Status {
    let vitals = Vitals::from_reading(reading);

    let breached = TIERS
        .iter()
        .filter(|tier| {
            tier.heart_rate.breached_by(vitals.heart_rate)
                || tier.patient_temperature.breached_by(vitals.patient_temperature)
                || tier.o2_saturation.breached_by(vitals.o2_saturation)
        })
        .map(|tier| tier.status)
        .max_by_key(Status::severity);

    match breached {
        Some(status) => status,
        None if vitals.any_missing() => Status::Unknown,
        None => Status::Stable,
    }
}
