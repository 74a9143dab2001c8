mod args;
mod error;
mod serve;

use clap::Parser as _;

fn main() {
    human_panic::setup_panic!();
    let result = run();
    proc_exit::exit(result);
}

fn run() -> proc_exit::ExitResult {
    // clap exits with 2 on bad arguments, startup failures all share 1
    let cli = match args::Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                Err(proc_exit::Exit::new(proc_exit::Code::FAILURE))
            } else {
                Ok(())
            };
        }
    };

    cli.color.write_global();
    let colored_stderr =
        anstream::AutoStream::choice(&std::io::stderr()) != anstream::ColorChoice::Never;
    args::init_logging(cli.verbose.clone(), colored_stderr);

    serve::run(&cli)
}
