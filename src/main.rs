use kestrel_ibl::cli::{CliCommand, USAGE};
use std::process;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let command = match CliCommand::parse_from_env() {
        Ok(CliCommand::Bake(command)) => command,
        Ok(CliCommand::Help) => {
            eprint!("{USAGE}");
            return;
        }
        Err(err) => {
            eprintln!("[cli] {err}");
            eprint!("{USAGE}");
            process::exit(2);
        }
    };
    let result = command.resolve_config().and_then(|config| {
        if !command.overrides.is_empty() {
            log::debug!("command-line overrides: {:?}", command.overrides);
        }
        kestrel_ibl::run(command.mode, &command.input, &command.output, &config)
    });
    match result {
        Ok(written) => {
            for path in written {
                log::info!("wrote {}", path.display());
            }
        }
        Err(err) => {
            eprintln!("error: {err:?}");
            process::exit(1);
        }
    }
}
