mod browse_manager;
mod browse_model;
mod config;
mod console_view;
mod media_source;
mod metadata_tags;
mod playback_session;
mod protocol;
mod thumbnail_manager;

use std::io::BufRead;
use std::thread;

use log::{debug, info, warn};
use tokio::sync::broadcast;

use browse_manager::BrowseManager;
use config::{sanitize_config, Config};
use console_view::ConsoleView;
use media_source::LocalMediaSource;
use playback_session::PlaybackSessionStub;
use protocol::{BrowseMessage, Message, PlaybackMessage};
use thumbnail_manager::ThumbnailManager;

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "non-string panic payload".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Select(usize),
    Back,
    Pause,
    Resume,
    StopPlayback,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.trim().split_whitespace();
    let head = parts.next()?;
    match head {
        "back" | "b" => Some(Command::Back),
        "pause" => Some(Command::Pause),
        "resume" => Some(Command::Resume),
        "stop" => Some(Command::StopPlayback),
        "help" | "?" => Some(Command::Help),
        "quit" | "q" | "exit" => Some(Command::Quit),
        "select" => parts
            .next()
            .and_then(|argument| argument.parse().ok())
            .map(Command::Select),
        // A bare row number selects that row.
        other => other.parse().ok().map(Command::Select),
    }
}

fn print_help() {
    println!("Commands:");
    println!("  <n> | select <n>   select row n (opens folders, plays tracks)");
    println!("  back | b           go up one level");
    println!("  pause / resume     transport control");
    println!("  stop               stop playback");
    println!("  quit | q           exit");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Info);
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let config_dir = dirs::config_dir().ok_or("could not determine config directory")?;
    let config_file = config_dir.join("tunetree.toml");

    if !config_file.exists() {
        let default_config = Config::default();

        info!(
            "Config file not found. Creating default config. path={}",
            config_file.display()
        );
        std::fs::write(&config_file, toml::to_string(&default_config)?)?;
    }

    let config_content = std::fs::read_to_string(&config_file)?;
    let mut config = sanitize_config(toml::from_str::<Config>(&config_content).unwrap_or_default());

    if config.library.folders.is_empty() {
        if let Some(music_dir) = dirs::audio_dir() {
            info!(
                "No library folders configured. Falling back to {}",
                music_dir.display()
            );
            config.library.folders.push(music_dir);
        }
    }

    // Optional first argument: node to open instead of the root.
    let start_node = std::env::args().nth(1);

    // Bus for communication between components
    let (bus_sender, _) = broadcast::channel(config.bus.capacity);

    // Setup browse manager
    let browse_bus_sender = bus_sender.clone();
    let browse_folders = config.library.folders.clone();
    let browse_handle = thread::spawn(move || {
        let run_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let source = LocalMediaSource::new(browse_folders);
            let mut browse_manager = BrowseManager::new(
                Box::new(source),
                browse_bus_sender.subscribe(),
                browse_bus_sender.clone(),
            );
            browse_manager.start(start_node);
            browse_manager.run();
        }));
        if let Err(payload) = run_result {
            log::error!(
                "BrowseManager thread terminated due to panic: {}",
                panic_payload_to_string(payload.as_ref())
            );
        }
    });

    // Setup thumbnail manager
    let thumbnail_bus_sender = bus_sender.clone();
    let thumbnail_bus_receiver = bus_sender.subscribe();
    let list_image_max_edge_px = config.thumbnails.list_image_max_edge_px;
    thread::spawn(move || {
        let mut thumbnail_manager = ThumbnailManager::new(
            thumbnail_bus_receiver,
            thumbnail_bus_sender,
            list_image_max_edge_px,
        );
        thumbnail_manager.run();
    });

    // Setup playback session stub
    let session_bus_sender = bus_sender.clone();
    let session_bus_receiver = bus_sender.subscribe();
    thread::spawn(move || {
        let mut playback_session = PlaybackSessionStub::new(session_bus_receiver, session_bus_sender);
        playback_session.run();
    });

    // Setup console view
    let view_bus_sender = bus_sender.clone();
    let view_bus_receiver = bus_sender.subscribe();
    thread::spawn(move || {
        let mut console_view = ConsoleView::new(view_bus_receiver, view_bus_sender);
        console_view.run();
    });

    print_help();

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let Some(command) = parse_command(&line) else {
            if !line.trim().is_empty() {
                warn!("Unknown command: {}", line.trim());
            }
            continue;
        };
        debug!("Console command: {:?}", command);
        match command {
            Command::Select(position) => {
                let _ = bus_sender.send(Message::Browse(BrowseMessage::SelectItem(position)));
            }
            Command::Back => {
                let _ = bus_sender.send(Message::Browse(BrowseMessage::NavigateBack));
            }
            Command::Pause => {
                let _ = bus_sender.send(Message::Playback(PlaybackMessage::Pause));
            }
            Command::Resume => {
                let _ = bus_sender.send(Message::Playback(PlaybackMessage::Resume));
            }
            Command::StopPlayback => {
                let _ = bus_sender.send(Message::Playback(PlaybackMessage::Stop));
            }
            Command::Help => print_help(),
            Command::Quit => {
                let _ = bus_sender.send(Message::Browse(BrowseMessage::Shutdown));
                break;
            }
        }
    }

    // Let the browse manager tear its session down before the process exits.
    let _ = browse_handle.join();

    info!("Application exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{parse_command, Command};

    #[test]
    fn test_parse_command_accepts_bare_row_numbers() {
        assert_eq!(parse_command("3"), Some(Command::Select(3)));
        assert_eq!(parse_command("select 12"), Some(Command::Select(12)));
        assert_eq!(parse_command("  7  "), Some(Command::Select(7)));
    }

    #[test]
    fn test_parse_command_keywords() {
        assert_eq!(parse_command("back"), Some(Command::Back));
        assert_eq!(parse_command("b"), Some(Command::Back));
        assert_eq!(parse_command("pause"), Some(Command::Pause));
        assert_eq!(parse_command("resume"), Some(Command::Resume));
        assert_eq!(parse_command("stop"), Some(Command::StopPlayback));
        assert_eq!(parse_command("help"), Some(Command::Help));
        assert_eq!(parse_command("quit"), Some(Command::Quit));
        assert_eq!(parse_command("q"), Some(Command::Quit));
    }

    #[test]
    fn test_parse_command_rejects_garbage() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("   "), None);
        assert_eq!(parse_command("open sesame"), None);
        assert_eq!(parse_command("select many"), None);
    }
}
