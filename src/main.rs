//! Lecture live translator: captures the microphone, runs a bidirectional
//! live translation session against the Gemini Live API, plays the translated
//! speech back gaplessly, and keeps a persistent transcript history.

mod api;
mod audio;
mod config;
mod error;
mod export;
mod history;
mod session;

use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};

use log::{info, warn};

use api::live::{LiveVoice, SessionSetup};
use config::{config_path, load_config, save_config, Config, ThemeMode};
use history::HistoryStore;
use session::{SessionController, SessionState};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_file = config_path();
    let mut config = load_config(&config_file);
    if config.gemini_api_key.is_empty() {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            config.gemini_api_key = key;
        }
    }

    let history = Arc::new(Mutex::new(HistoryStore::load(HistoryStore::default_path())));
    let mut controller = make_controller(&config, history.clone());

    info!("[MAIN] ready, voice={}", config.voice.as_str());
    println!("lecture-live-translator -- type 'help' for commands");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            continue;
        };
        let arg = parts.next();

        match command {
            "start" => {
                if config.gemini_api_key.is_empty() {
                    println!("no API key; set GEMINI_API_KEY or edit the config file");
                    continue;
                }
                controller.start();
            }
            "stop" => controller.stop(),
            "status" => match controller.state() {
                SessionState::Error(msg) => println!("error: {}", msg),
                other => println!("{}", other.as_str()),
            },
            "history" => print_history(&history),
            "export" => {
                let history = history.lock().unwrap();
                match export::write_export(&history, &std::env::current_dir().unwrap_or_default())
                {
                    Some(path) => println!("exported {}", path.display()),
                    None => println!("nothing to export"),
                }
            }
            "copy" => copy_entry(&history, arg),
            "role" => toggle_role(&history, arg),
            "clear" => {
                history.lock().unwrap().clear_all();
                println!("history cleared");
            }
            "voice" => {
                let Some(name) = arg else {
                    println!("current voice: {}", config.voice.as_str());
                    continue;
                };
                match LiveVoice::from_name(name) {
                    Some(voice) => {
                        config.voice = voice;
                        save_config(&config_file, &config);
                        // Takes effect on the next session.
                        controller.stop();
                        controller = make_controller(&config, history.clone());
                        println!("voice set to {}", voice.as_str());
                    }
                    None => println!("unknown voice '{}'", name),
                }
            }
            "theme" => {
                match arg {
                    Some("light") => config.theme = ThemeMode::Light,
                    Some("dark") => config.theme = ThemeMode::Dark,
                    _ => {
                        println!("usage: theme <light|dark>");
                        continue;
                    }
                }
                save_config(&config_file, &config);
            }
            "accent" => {
                let Some(color) = arg else {
                    println!("current accent: {}", config.accent_color);
                    continue;
                };
                config.accent_color = color.to_string();
                save_config(&config_file, &config);
            }
            "quit" | "exit" => break,
            "help" => print_help(),
            other => println!("unknown command '{}', try 'help'", other),
        }
    }

    controller.stop();
    info!("[MAIN] shutdown");
}

fn make_controller(config: &Config, history: Arc<Mutex<HistoryStore>>) -> SessionController {
    SessionController::new(
        config.gemini_api_key.clone(),
        SessionSetup::interpreter(config.voice),
        history,
    )
}

fn print_history(history: &Arc<Mutex<HistoryStore>>) {
    let history = history.lock().unwrap();
    if history.is_empty() {
        println!("(empty)");
        return;
    }
    for (i, entry) in history.entries().iter().enumerate() {
        println!(
            "{:>3}. [{}] {} ({})",
            i + 1,
            entry.timestamp,
            entry.role.as_str(),
            entry.source_language
        );
        println!("     {}", entry.source_text);
        println!("     {}", entry.translated_text);
    }
}

fn copy_entry(history: &Arc<Mutex<HistoryStore>>, arg: Option<&str>) {
    let Some(index) = arg.and_then(|a| a.parse::<usize>().ok()).filter(|n| *n > 0) else {
        println!("usage: copy <n>");
        return;
    };
    let history = history.lock().unwrap();
    let Some(entry) = history.entries().get(index - 1) else {
        println!("no entry {}", index);
        return;
    };
    match export::copy_translation(&entry.translated_text) {
        Some(_) => println!("copied"),
        None => {
            warn!("[MAIN] clipboard copy failed");
            println!("clipboard unavailable");
        }
    }
}

fn toggle_role(history: &Arc<Mutex<HistoryStore>>, arg: Option<&str>) {
    let Some(index) = arg.and_then(|a| a.parse::<usize>().ok()).filter(|n| *n > 0) else {
        println!("usage: role <n>");
        return;
    };
    let mut history = history.lock().unwrap();
    let Some(id) = history.entries().get(index - 1).map(|e| e.id.clone()) else {
        println!("no entry {}", index);
        return;
    };
    history.toggle_role(&id);
    println!(
        "entry {} is now {}",
        index,
        history.entries()[index - 1].role.as_str()
    );
}

fn print_help() {
    println!("  start            open a live translation session");
    println!("  stop             close the session");
    println!("  status           show the session state");
    println!("  history          list stored turns");
    println!("  export           write the history to a dated text file");
    println!("  copy <n>         copy a translation to the clipboard");
    println!("  role <n>         toggle Professor/Student on an entry");
    println!("  clear            delete all history");
    println!("  voice [name]     show or set the playback voice");
    println!("  theme <mode>     set light or dark theme");
    println!("  accent <color>   set the accent color");
    println!("  quit             exit");
}
