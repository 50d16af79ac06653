use std::time::Duration;

use crate::solver::HighsModelStatus;

/// Helper function for displaying the greeting data for the scheduling
pub fn scheduling_greeting(
    num_windows: usize,
    block_size: usize,
    impact_horizon: usize,
) {
    println!("\n# Scheduling");
    println!("- Windows: {num_windows}");
    println!("- Window size: {block_size}");
    println!("- Impact horizon: {impact_horizon}");
}

/// Helper function for displaying the window table header
pub fn window_table_header() {
    println!(
        "{0: ^8} | {1: ^9} | {2: ^16} | {3: ^14} | {4: ^10} | {5: ^8}",
        "window", "steps", "status", "objective ($)", "gap", "time (s)"
    )
}

/// Helper function for displaying a divider for the window table
pub fn window_table_divider() {
    println!("--------------------------------------------------------------------------------")
}

/// Helper function for displaying a row of window results for
/// the window table
pub fn window_table_row(
    window: usize,
    begin: usize,
    end: usize,
    status: HighsModelStatus,
    objective: f64,
    gap: f64,
    time: Duration,
) {
    println!(
        "{0: >8} | {1: >9} | {2: >16} | {3: >14.4} | {4: >10.2e} | {5: >8.2}",
        window,
        format!("{}..{}", begin, end),
        format!("{:?}", status),
        objective,
        gap,
        time.as_millis() as f64 / 1000.0
    )
}

pub fn show_greeting() {
    println!("# hydrosched");
}

pub fn input_reading_line(path: &str) {
    println!("\nReading inputs from '{path}'");
}

pub fn output_generation_line(path: &str) {
    println!("\nWriting outputs to '{path}'");
}

pub fn validation_result(objective: f64) {
    println!("\nValidated schedule value ($): {:.4}", objective);
}

pub fn scheduling_duration(time: Duration) {
    println!(
        "\nScheduling time: {:.2} s",
        time.as_millis() as f64 / 1000.0
    )
}
