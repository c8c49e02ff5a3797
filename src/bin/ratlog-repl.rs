use ratlog::Session;
use rustyline::error::ReadlineError;
use rustyline::Editor;

fn main() {
    let mut rl = Editor::<()>::new();
    let mut session = Session::new();
    loop {
        let readline = rl.readline("?- ");
        match readline {
            Ok(line) => {
                rl.add_history_entry(line.as_str());
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Some(rest) = line.strip_prefix(':') {
                    let (command, arg) = match rest.find(' ') {
                        Some(space) => (&rest[..space], rest[space + 1..].trim()),
                        None => (rest, ""),
                    };
                    match command {
                        "reset" => {
                            session = Session::new();
                        }
                        "load" => {
                            if arg.is_empty() {
                                println!("Usage:\n\t:load <filename>");
                                continue;
                            }
                            match std::fs::read_to_string(arg) {
                                Ok(contents) => match session.load_str(&contents) {
                                    Ok(()) => {
                                        println!("Loaded!");
                                        let mut out = std::io::stdout().lock();
                                        let _ = session.run_goals(&mut out);
                                    }
                                    Err(err) => {
                                        println!("Failed to parse: {}", err);
                                    }
                                },
                                Err(err) => {
                                    println!("Failed to load: {}", err);
                                }
                            }
                        }
                        "list" => {
                            print!("{}", session.listing());
                        }
                        "help" => {
                            println!(
                                "Available commands:
\t:help
\t:reset
\t:list
\t:load <filename>
Any other input is read as a query, e.g. `nat(s(X)).`"
                            );
                        }
                        other => {
                            println!("Unknown command: :{}", other);
                        }
                    }
                } else {
                    match session.run_query_str(line) {
                        Ok(output) => print!("{}", output),
                        Err(err) => println!("Failed to parse: {}", err),
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("interrupted, use CTRL+D for quitting");
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }
}
