//! Divisibility checks served by all three provider kinds.
//!
//! # Usage
//!
//! ```bash
//! divisibility 12 35 abc 30
//! ```
//!
//! Each argument is sent to the `checker` provider from a separate thread
//! while `counter` and `sensor` keep running; the server stops once every
//! answer is in.
//!
//! # Environment
//!
//! - `DIVISIBILITY_PERIOD_MS` - counter period (default 1000)
//! - `RUST_LOG` - log filter (default `info`)

use core::time::Duration;
use std::thread;

use example::{CheckerMessages, DivisibilityPlugin, DivisibilityPlugins};
use hookwork_system::{PluginGroup, Server};

const ANSWER_TIMEOUT: Duration = Duration::from_secs(10);

fn main() {
    let _ = dotenvy::dotenv();

    let period = std::env::var("DIVISIBILITY_PERIOD_MS")
        .ok()
        .and_then(|ms| ms.parse().ok())
        .map_or(Duration::from_secs(1), Duration::from_millis);

    let mut numbers: Vec<String> = std::env::args().skip(1).collect();
    if numbers.is_empty() {
        numbers = vec!["4".into(), "9".into(), "30".into()];
    }

    let mut server = Server::new();
    server.add_plugins(
        DivisibilityPlugins {
            divisibility: DivisibilityPlugin::default().with_period(period),
        }
        .build(),
    );
    server.finish();

    let Some(messages) = server.resource::<CheckerMessages>().cloned() else {
        tracing::error!("checker message system missing");
        std::process::exit(1);
    };
    let handle = server.handle();

    let callers = thread::spawn(move || {
        let askers: Vec<_> = numbers
            .into_iter()
            .map(|number| {
                let messages = messages.clone();
                thread::spawn(move || {
                    let answer = messages.send_wait_answer_blocking(number.clone(), Some(ANSWER_TIMEOUT));
                    (number, answer)
                })
            })
            .collect();

        for asker in askers {
            match asker.join() {
                Ok((number, Ok(verdicts))) => tracing::info!(%number, ?verdicts, "answered"),
                Ok((number, Err(error))) => tracing::warn!(%number, error = %error, "not answered"),
                Err(_) => tracing::error!("caller thread panicked"),
            }
        }
        handle.stop();
    });

    if let Err(error) = server.run() {
        tracing::error!(error = %error, "server failed");
        std::process::exit(1);
    }
    let _ = callers.join();
}
