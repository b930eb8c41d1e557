use std::process::ExitCode;

fn main() -> ExitCode {
    pubscope_cli::run()
}
