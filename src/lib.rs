pub mod curve;
pub mod input;
pub mod instance;
mod log;
pub mod model;
pub mod output;
pub mod scheduler;
pub mod solution;
pub mod solver;
pub mod store;
use input::Input;
use std::error::Error;

pub fn run(input_args: &InputArgs) -> Result<(), Box<dyn Error>> {
    log::show_greeting();

    let input = Input::build(&input_args.path);
    log::input_reading_line(&input_args.path);
    let instance = input.instance.build_instance()?;
    let config = input.config.build_schedule_config(&instance)?;

    let schedule = scheduler::solve(&instance, &config)?;
    schedule.verify_bounds(&instance)?;

    log::output_generation_line(&input_args.path);
    output::generate_outputs(&schedule, &input_args.path)?;

    Ok(())
}

pub struct InputArgs {
    pub path: String,
}

impl InputArgs {
    pub fn build(args: &[String]) -> Result<Self, &'static str> {
        if args.len() < 2 {
            return Err("Not enough arguments [PATH]");
        }

        let path = args[1].clone();

        Ok(Self { path })
    }
}
