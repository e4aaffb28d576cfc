use std::fmt;

use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Theme {
    /// Pick colors suitable for dark terminals.
    Auto,
    Dark,
    /// No colors, attribute styling only.
    Mono,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Theme::Auto => "auto",
            Theme::Dark => "dark",
            Theme::Mono => "mono",
        };
        f.write_str(name)
    }
}

/// Runtime options, derived from command-line flags. Nothing here is
/// persisted between runs.
#[derive(Debug, Clone)]
pub struct Config {
    pub use_icons: bool,
    pub theme: Theme,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            use_icons: true,
            theme: Theme::Auto,
        }
    }
}
