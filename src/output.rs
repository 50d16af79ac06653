use csv::Writer;
use serde;
use std::error::Error;
use std::fs;

use crate::solution::Schedule;

#[derive(serde::Serialize)]
struct ScheduleRow<'a> {
    reservoir_id: &'a str,
    step: usize,
    flow: f64,
    volume: f64,
    power: f64,
    price: f64,
}

/// One flat row per reservoir and step, for spreadsheet consumption.
fn write_schedule_table(
    schedule: &Schedule,
    path: &str,
) -> Result<(), Box<dyn Error>> {
    let mut wtr = Writer::from_path(&(path.to_owned() + "/schedule.csv"))?;
    for reservoir in schedule.reservoirs.iter() {
        for (step, &flow) in reservoir.flows.iter().enumerate() {
            wtr.serialize(ScheduleRow {
                reservoir_id: &reservoir.id,
                step,
                flow,
                volume: reservoir.volumes[step],
                power: reservoir.powers[step],
                price: schedule.prices[step],
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// The full schedule document, including the per-reservoir totals.
fn write_solution_document(
    schedule: &Schedule,
    path: &str,
) -> Result<(), Box<dyn Error>> {
    let contents = serde_json::to_string_pretty(schedule)?;
    fs::write(path.to_owned() + "/solution.json", contents)?;
    Ok(())
}

pub fn generate_outputs(
    schedule: &Schedule,
    path: &str,
) -> Result<(), Box<dyn Error>> {
    write_schedule_table(schedule, path)?;
    write_solution_document(schedule, path)?;
    Ok(())
}
