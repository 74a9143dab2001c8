use anyhow::Context as _;
use proc_exit::prelude::*;

use crate::args::Cli;
use crate::error::Result;

pub(crate) fn run(cli: &Cli) -> proc_exit::ExitResult {
    let config = lan_serve::ServeConfig {
        root: cli.directory.clone(),
        port: cli.port,
        bind: cli.bind,
    };

    let running = lan_serve::start(&config).map_err(|err| report(&err))?;

    let stopper = running.stopper();
    ctrlc::set_handler(move || stopper.stop())
        .context("failed to install the CTRL+C handler")
        .with_code(proc_exit::Code::FAILURE)?;
    print_banner(running.banner());

    if cli.open {
        open_browser(running.banner().local_url.clone()).with_code(proc_exit::Code::FAILURE)?;
    }

    running.run().map_err(|err| report(&err))?;
    anstream::println!("\n\nServer stopped.");

    Ok(())
}

fn print_banner(banner: &lan_serve::Banner) {
    let rule = anstyle::Style::new().dimmed();
    let heading = anstyle::AnsiColor::Green.on_default() | anstyle::Effects::BOLD;
    for line in banner.to_string().lines() {
        if line.starts_with('=') {
            anstream::println!("{rule}{line}{rule:#}");
        } else if line == "Server running!" {
            anstream::println!("{heading}{line}{heading:#}");
        } else {
            anstream::println!("{line}");
        }
    }
    anstream::println!();
}

fn report(err: &lan_serve::ServeError) -> proc_exit::Exit {
    let error = anstyle::AnsiColor::Red.on_default() | anstyle::Effects::BOLD;
    match err {
        lan_serve::ServeError::DirectoryNotFound { .. } => {
            anstream::eprintln!("{error}Error:{error:#} {err}");
        }
        lan_serve::ServeError::AddressInUse { .. } => {
            anstream::eprintln!("\n{error}Error:{error:#} {err}");
            anstream::eprintln!("Try a different port: lan-serve [directory] [port]\n");
        }
        lan_serve::ServeError::PermissionDenied { .. } | lan_serve::ServeError::Io(_) => {
            anstream::eprintln!("\n{error}Error:{error:#} {err}\n");
        }
    }
    proc_exit::Exit::new(proc_exit::Code::FAILURE)
}

fn open_browser(url: String) -> Result<()> {
    match open::that(url) {
        Ok(()) => log::info!("Please check your browser!"),
        Err(why) => anstream::eprintln!("Failure to execute command: {why}"),
    }
    Ok(())
}
