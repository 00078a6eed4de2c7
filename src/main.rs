//! Controller daemon.
//!
//! Loads the configuration, closes every valve once as a recovery sweep,
//! then runs the 1 Hz tick loop: advance the scheduler, and at the
//! configured trigger time fetch the day's weather and kick off the
//! auto-schedule pass.

use std::time::Duration;

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate, Timelike};
use log::{info, warn};

use irrigctl::adapters::{
    FileConfigStore, FileWeatherSource, LogEventSink, LogValveController, ShellValveController,
};
use irrigctl::app::ports::{ConfigStore, ValvePort, WeatherSource};
use irrigctl::app::ControllerService;
use irrigctl::config::TimeOfDay;

struct Options {
    config_path: String,
    driver_dir: Option<String>,
    weather_path: String,
}

fn parse_args() -> anyhow::Result<Options> {
    let mut config_path = None;
    let mut driver_dir = None;
    let mut weather_path = "weather.json".to_string();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--drivers" => {
                driver_dir = Some(args.next().context("--drivers needs a directory")?);
            }
            "--weather" => {
                weather_path = args.next().context("--weather needs a file path")?;
            }
            "--help" => {
                eprintln!(
                    "usage: irrigctl <config.json> [--drivers DIR] [--weather FILE]\n\
                     without --drivers, valve commands are logged only"
                );
                std::process::exit(0);
            }
            other if config_path.is_none() => config_path = Some(other.to_string()),
            other => bail!("unexpected argument: {other}"),
        }
    }

    Ok(Options {
        config_path: config_path.context("missing config file argument")?,
        driver_dir,
        weather_path,
    })
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = parse_args()?;
    let store = FileConfigStore::new(&options.config_path);
    let config = store.load().context("loading configuration")?;
    info!(
        "starting: {} zone(s), trigger at {}",
        config.zones.len(),
        config.global.run_time_am
    );

    let mut valves: Box<dyn ValvePort> = match &options.driver_dir {
        Some(dir) => Box::new(ShellValveController::new(dir)),
        None => {
            warn!("no --drivers directory, valve commands will only be logged");
            Box::new(LogValveController)
        }
    };
    let mut weather = FileWeatherSource::new(&options.weather_path);
    let mut sink = LogEventSink;
    let mut service = ControllerService::new(config);

    // A previous crash may have left a valve open.
    if let Err(detail) = valves.close_all() {
        warn!("startup valve sweep failed: {detail}");
    }

    // The tick period is sleep plus work, so wall-clock seconds get
    // skipped; fire on the first tick at or past a trigger, once per
    // (date, trigger). A weather failure leaves the guard unset so the
    // next tick retries the fetch.
    let mut last_fired: Option<(NaiveDate, TimeOfDay)> = None;

    loop {
        let now = Local::now();
        let today = now.date_naive();
        let seconds_into_day = now.time().num_seconds_from_midnight();

        if let Some(trigger) = service.due_trigger(seconds_into_day) {
            if last_fired != Some((today, trigger)) {
                let station = service.config().global.airport_code.clone();
                match weather.observation_for(&station, today) {
                    Ok(observation) => {
                        service.ingest_weather(today, observation);
                        if let Err(e) =
                            service.run_auto_schedule(today, valves.as_mut(), &mut sink)
                        {
                            warn!("auto-schedule failed: {e}");
                        }
                        last_fired = Some((today, trigger));
                    }
                    Err(detail) => warn!("weather fetch for {station} failed: {detail}"),
                }
            }
        }

        service.tick(today, valves.as_mut(), &mut sink);
        std::thread::sleep(Duration::from_secs(1));
    }
}
