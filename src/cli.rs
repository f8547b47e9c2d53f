use std::env;
use std::process;

/// Operation requested on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List(String),
    Get { remote: String, local: String },
    Put { local: String, remote: String },
    Pwd,
    MakeDir(String),
    RemoveDir(String),
    Delete(String),
    Rename { from: String, to: String },
}

/// Parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    /// Path to log file (None for stdout)
    pub log_file: Option<String>,
    /// Overrides the profile timeout, seconds
    pub timeout: Option<u64>,
    /// Log control channel traffic
    pub verbose: bool,
    /// Path to the connection profile
    pub profile: String,
    pub command: Command,
}

/// Prints usage instructions for the program.
pub fn print_usage() {
    println!(
        "Usage: {} [-h] [-v] [-V] [-l logfile] [-t timeout] profile.json command [args]",
        crate::PROGRAM_NAME
    );
    println!("Commands:");
    println!("  ls [path]              list a directory");
    println!("  get remote [local]     download a file");
    println!("  put local [remote]     upload a file");
    println!("  pwd                    print the working directory");
    println!("  mkdir path | rmdir path | rm path");
    println!("  mv from to             rename");
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {}", message);
    print_usage();
    process::exit(1);
}

/// Parses command line arguments
///
/// Prints usage and exits on `-h`, `-v` or invalid input.
pub fn parse_args() -> Args {
    match parse_from(env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => fail(&message),
    }
}

/// Parses an argument list without the program name
pub fn parse_from<I: IntoIterator<Item = String>>(argv: I) -> Result<Args, String> {
    let mut log_file = None;
    let mut timeout = None;
    let mut verbose = false;
    let mut positional = Vec::new();

    let mut args = argv.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" => {
                print_usage();
                process::exit(0);
            }
            "-v" => {
                println!("{} version {}", crate::PROGRAM_NAME, crate::PROGRAM_VERSION);
                process::exit(0);
            }
            "-V" => verbose = true,
            "-l" => {
                log_file = Some(args.next().ok_or("Missing log file argument")?);
            }
            "-t" => {
                let value = args.next().ok_or("Missing timeout argument")?;
                timeout = match value.parse::<u64>() {
                    Ok(n) if n > 0 => Some(n),
                    _ => return Err("Timeout must be a positive number".to_string()),
                };
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let profile = positional.next().ok_or("Missing profile argument")?;
    let verb = positional.next().ok_or("Missing command")?;
    let rest: Vec<String> = positional.collect();
    let arg = |i: usize, what: &str| -> Result<String, String> {
        rest.get(i).cloned().ok_or(format!("{} needs {}", verb, what))
    };

    let command = match verb.as_str() {
        "ls" => Command::List(rest.first().cloned().unwrap_or_default()),
        "get" => {
            let remote = arg(0, "a remote path")?;
            let local = rest.get(1).cloned().unwrap_or_else(|| basename(&remote));
            Command::Get { remote, local }
        }
        "put" => {
            let local = arg(0, "a local path")?;
            let remote = rest.get(1).cloned().unwrap_or_else(|| basename(&local));
            Command::Put { local, remote }
        }
        "pwd" => Command::Pwd,
        "mkdir" => Command::MakeDir(arg(0, "a path")?),
        "rmdir" => Command::RemoveDir(arg(0, "a path")?),
        "rm" => Command::Delete(arg(0, "a path")?),
        "mv" => Command::Rename {
            from: arg(0, "a source path")?,
            to: arg(1, "a target path")?,
        },
        other => return Err(format!("Unknown command {}", other)),
    };

    Ok(Args {
        log_file,
        timeout,
        verbose,
        profile,
        command,
    })
}

fn basename(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}
