use colored::{ColoredString, Colorize};
use semgate::domain::LifecycleState;

pub(super) struct FormatService;

const ACTIVE_CHAR: &str = "*";

impl FormatService {
    pub fn active_item_table<F>(descriptors: Vec<String>, active: F)
    where
        F: Fn(usize) -> bool,
    {
        for (i, descriptor) in descriptors.iter().enumerate() {
            if active(i) {
                println!("{} {}", ACTIVE_CHAR.green().bold(), descriptor.bold());
            } else {
                let blank: String = ACTIVE_CHAR.chars().map(|_| ' ').collect();
                println!("{} {}", blank, descriptor);
            }
        }
    }

    pub fn error(msg: &str) {
        eprintln!("{} {}", "[ERROR]".red().bold(), msg);
    }

    pub fn warning(msg: &str) {
        eprintln!("{} {}", "[WARN]".yellow().bold(), msg);
    }

    pub fn success(msg: &str) {
        println!("{} {}", "[SUCCESS]".green().bold(), msg)
    }

    pub fn info(msg: &str) {
        println!("{} {}", "[INFO]".blue().bold(), msg)
    }

    pub fn state(state: LifecycleState) -> ColoredString {
        let text = state.to_string();
        match state {
            LifecycleState::Active => text.green(),
            LifecycleState::Closing => text.yellow(),
            LifecycleState::LockedSoft | LifecycleState::LockedHard => text.red(),
            LifecycleState::Archived => text.dimmed(),
            LifecycleState::Unknown => text.normal(),
        }
    }

    pub fn writable(writable: bool) -> ColoredString {
        if writable {
            "writable".green().bold()
        } else {
            "read-only".red().bold()
        }
    }
}
