mod cli;
mod run;

use std::process::ExitCode;

use rgbd::DeviceError;

fn main() -> ExitCode {
    let args = cli::parse();
    match run::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("rgbdview: {err:#}");
            let code = err
                .downcast_ref::<DeviceError>()
                .map(DeviceError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}
