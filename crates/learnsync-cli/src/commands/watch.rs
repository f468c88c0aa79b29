use std::path::Path;
use std::sync::Arc;

use learnsync_core::events::{EventKind, Listener, SyncEvent};

use crate::commands::common::{format_event_line, open_manager};
use crate::error::CliError;

fn print_event(event: &SyncEvent, as_json: bool) {
    if as_json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(error) => tracing::warn!("Could not encode {} event: {error}", event.kind),
        }
    } else {
        println!("{}", format_event_line(event));
    }
}

pub async fn run_watch(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let manager = open_manager(db_path).await?;

    let printer: Listener = Arc::new(move |event: &SyncEvent| print_event(event, as_json));
    for kind in EventKind::ALL {
        manager.add_event_listener(kind, Arc::clone(&printer));
    }

    manager.connectivity().check_now().await;
    manager.start();
    if !as_json {
        println!("Watching for changes; press Ctrl-C to stop");
    }

    tokio::signal::ctrl_c().await?;
    manager.destroy();
    Ok(())
}
