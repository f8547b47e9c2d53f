use pasvftp::cli::{parse_args, Command};
use pasvftp::{load_profile, log, set_log_file, FtpResult, LogSink, Session};
use secrecy::ExposeSecret;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::process;
use std::sync::Arc;
use std::time::Duration;

fn run(session: &mut Session, command: &Command) -> FtpResult<()> {
    match command {
        Command::List(path) => {
            for entry in session.list(path)? {
                println!("{}", entry.raw);
            }
        }
        Command::Get { remote, local } => {
            let mut file = BufWriter::new(File::create(local)?);
            let bytes = session.retr_into(remote, &mut file)?;
            let _ = log(&format!("Downloaded {} to {} ({} bytes)", remote, local, bytes));
        }
        Command::Put { local, remote } => {
            let mut file = BufReader::new(File::open(local)?);
            let bytes = session.stor(remote, &mut file)?;
            let _ = log(&format!("Uploaded {} to {} ({} bytes)", local, remote, bytes));
        }
        Command::Pwd => println!("{}", session.current_dir()?),
        Command::MakeDir(path) => session.make_dir(path)?,
        Command::RemoveDir(path) => session.remove_dir(path)?,
        Command::Delete(path) => session.delete(path)?,
        Command::Rename { from, to } => session.rename(from, to)?,
    }
    Ok(())
}

fn main() {
    let args = parse_args();
    if let Some(log_file) = &args.log_file {
        set_log_file(log_file);
    }

    let profile = match load_profile(&args.profile) {
        Ok(profile) => profile,
        Err(e) => {
            let _ = log(&format!("Error reading profile {}: {}", args.profile, e));
            process::exit(1);
        }
    };

    let mut options = profile.options();
    if let Some(secs) = args.timeout {
        options.timeout = Duration::from_secs(secs);
    }
    let sink = Arc::new(LogSink::new().verbose(args.verbose));

    let mut session = match Session::connect_with(&profile.address(), options, sink) {
        Ok(session) => session,
        Err(e) => {
            let _ = log(&format!("Error connecting to {}: {}", profile.address(), e));
            process::exit(1);
        }
    };
    if let Err(e) = session.login(&profile.login, profile.password.expose_secret()) {
        let _ = log(&format!("Error logging into {}: {}", profile.host, e));
        session.quit();
        process::exit(1);
    }

    let result = run(&mut session, &args.command);
    session.quit();
    if let Err(e) = result {
        let _ = log(&format!("Error: {}", e));
        process::exit(1);
    }
}
