use tracing::trace;
use tracing_subscriber;

use clap::{value_t, values_t, App, Arg};

use std::path::Path;

use zfx_frost::node;
use zfx_frost::settings::Settings;
use zfx_frost::Result;

const DEFAULT_HOME_DIR: &str = "settings";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_level(true)
        .with_target(true)
        .compact()
        .with_max_level(tracing::Level::INFO)
        .init();

    let matches = App::new("zfx-frost")
        .version("0.1")
        .author("zero.fx labs ltd.")
        .about("Runs initial block download for a zero.fx node")
        .arg(
            Arg::with_name("listener-ip")
                .short("a")
                .long("listener-ip")
                .value_name("LISTENER_IP")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("sync-peer")
                .short("s")
                .long("sync-peer")
                .value_name("SYNC_PEER")
                .multiple(true),
        )
        .arg(
            Arg::with_name("quorum")
                .short("q")
                .long("quorum")
                .value_name("QUORUM")
                .takes_value(true),
        )
        .arg(Arg::with_name("home").short("h").long("home").takes_value(true).required(false))
        .get_matches();

    let home_dir = matches.value_of("home").unwrap_or(DEFAULT_HOME_DIR);
    let mut settings = Settings::new(Path::new(home_dir)).expect("failed to load configuration.");

    if let Some(ip) = matches.value_of("listener-ip") {
        trace!("CLI arg for listener-ip provided: {}", ip);
        settings.listener_ip = ip.to_owned();
    }

    if let Some(peers) = matches.values_of("sync-peer") {
        trace!("CLI arg for sync-peer provided: {:?}", peers);
        settings.sync_peers =
            values_t!(matches.values_of("sync-peer"), String).unwrap_or_else(|e| e.exit());
    }

    if matches.is_present("quorum") {
        settings.quorum = value_t!(matches.value_of("quorum"), u32).unwrap_or_else(|e| e.exit());
    }

    let sys = actix::System::new();
    sys.block_on(async move {
        node::run(settings).unwrap();
    });
    sys.run().unwrap();

    Ok(())
}
