use std::process::ExitCode;

fn main() -> ExitCode {
    devkart_cli::run()
}
