use std::io::Write;
use std::process::ExitCode;

use ratlog::Session;

/// Each file named on the command line is parsed and run as an independent
/// program. Exit codes: 0 on success, 1 when a file cannot be read, 2 on a
/// parse error.
fn main() -> ExitCode {
    let files: Vec<String> = std::env::args().skip(1).collect();
    if files.is_empty() {
        eprintln!("no input files.");
        return ExitCode::SUCCESS;
    }

    let stdout = std::io::stdout();
    for file in &files {
        let source = match std::fs::read_to_string(file) {
            Ok(source) => source,
            Err(err) => {
                eprintln!("could not open {}: {}", file, err);
                return ExitCode::from(1);
            }
        };

        let mut session = Session::new();
        if let Err(err) = session.load_str(&source) {
            eprintln!("{}: {}", file, err);
            return ExitCode::from(2);
        }

        let mut out = stdout.lock();
        if session.run_goals(&mut out).and_then(|_| out.flush()).is_err() {
            // Nothing sensible left to do when stdout is gone.
            break;
        }
    }
    ExitCode::SUCCESS
}
