use std::io::Write as _;
use std::net::IpAddr;
use std::path;

/// Share a directory on the local network
#[derive(Clone, Debug, clap::Parser)]
#[command(name = "lan-serve", version)]
pub(crate) struct Cli {
    /// Directory to serve
    #[arg(value_name = "DIRECTORY", default_value = ".")]
    pub(crate) directory: path::PathBuf,

    /// Port to listen on
    #[arg(
        value_name = "PORT",
        default_value_t = 3000,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub(crate) port: u16,

    /// Interface to listen on
    #[arg(long, value_name = "IP", default_value = "0.0.0.0")]
    pub(crate) bind: IpAddr,

    /// Open a browser
    #[arg(long)]
    pub(crate) open: bool,

    #[command(flatten)]
    pub(crate) color: colorchoice_clap::Color,

    #[command(flatten)]
    pub(crate) verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,
}

pub(crate) fn init_logging(
    level: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,
    colored: bool,
) {
    let Some(level) = level.log_level() else {
        return;
    };

    let palette = if colored {
        Palette::colored()
    } else {
        Palette::plain()
    };

    let mut builder = env_logger::Builder::new();
    builder.write_style(if colored {
        env_logger::WriteStyle::Always
    } else {
        env_logger::WriteStyle::Never
    });
    builder.filter(None, level.to_level_filter());

    if level == log::Level::Trace || level == log::Level::Debug {
        builder.format_timestamp_secs();
    } else {
        builder.format(move |f, record| {
            let style = match record.level() {
                log::Level::Error => palette.error,
                log::Level::Warn => palette.warn,
                log::Level::Info => palette.info,
                log::Level::Debug | log::Level::Trace => palette.debug,
            };
            let level = format!("[{}]", record.level()).to_lowercase();
            writeln!(f, "{style}{level:8}{style:#} {}", record.args())
        });
    }

    builder.init();
}

#[derive(Copy, Clone, Default, Debug)]
struct Palette {
    error: anstyle::Style,
    warn: anstyle::Style,
    info: anstyle::Style,
    debug: anstyle::Style,
}

impl Palette {
    fn colored() -> Self {
        Self {
            error: anstyle::AnsiColor::Red.on_default() | anstyle::Effects::BOLD,
            warn: anstyle::AnsiColor::Yellow.on_default(),
            info: anstyle::AnsiColor::Green.on_default(),
            debug: anstyle::AnsiColor::Blue.on_default(),
        }
    }

    fn plain() -> Self {
        Self::default()
    }
}
