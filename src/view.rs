use crate::snapshot::SystemSnapshot;
use std::fmt;

/// House temperature above which the reading is flagged
pub const TEMPERATURE_WARN_C: f64 = 40.0;

const GAUGE_WIDTH: usize = 20;

/// Text rendering of one snapshot
pub struct Dashboard<'a> {
    snapshot: &'a SystemSnapshot,
}

impl<'a> Dashboard<'a> {
    pub fn new(snapshot: &'a SystemSnapshot) -> Self {
        Self { snapshot }
    }
}

fn online(connected: bool) -> &'static str {
    if connected {
        "Online"
    } else {
        "Offline"
    }
}

/// Risk score clamped into [0, 1] for the gauge
pub fn risk_fraction(risk_score: f64) -> f64 {
    if risk_score.is_nan() {
        return 0.0;
    }
    risk_score.clamp(0.0, 1.0)
}

fn gauge(fraction: f64) -> String {
    let filled = (fraction * GAUGE_WIDTH as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(GAUGE_WIDTH - filled))
}

impl fmt::Display for Dashboard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let SystemSnapshot { pole, house, alerts } = self.snapshot;

        writeln!(
            f,
            "Grid: {} | SPAN: {}",
            online(pole.connected),
            online(house.connected)
        )?;

        if alerts.theft_detected {
            writeln!(f, "!! THEFT DETECTED: power mismatch between pole and house")?;
        }
        if alerts.maintenance_risk {
            writeln!(
                f,
                "!! MAINTENANCE REQUIRED: risk score {}",
                alerts.risk_score
            )?;
        }

        writeln!(
            f,
            "Pole : {:.1} V  {:.2} A  {:.0} W  {:.2} kWh  PF {:.2}",
            pole.voltage, pole.current, pole.power, pole.energy, pole.power_factor
        )?;

        let temperature_flag = if house.temperature > TEMPERATURE_WARN_C {
            " HIGH"
        } else {
            ""
        };
        writeln!(
            f,
            "House: {:.1} V  {:.2} A  {:.0} W  {:.2} kWh  PF {:.2}  {:.1} °C{}",
            house.voltage,
            house.current,
            house.power,
            house.energy,
            house.power_factor,
            house.temperature,
            temperature_flag
        )?;

        let fraction = risk_fraction(alerts.risk_score);
        writeln!(
            f,
            "Risk : {} {:>3.0}%  {}",
            gauge(fraction),
            fraction * 100.0,
            alerts.message
        )?;

        let relays = house
            .relays
            .iter()
            .enumerate()
            .map(|(idx, on)| format!("Circuit {}: {}", idx + 1, if *on { "ON" } else { "OFF" }))
            .collect::<Vec<_>>()
            .join("  ");
        write!(f, "Relays: {}", relays)
    }
}
