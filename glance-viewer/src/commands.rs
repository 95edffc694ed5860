//! Interactive commands typed on stdin.
//!
//! ```text
//! fps 3          request 3 frames per second
//! quality 40     request encoder quality 40
//! scale 0.5      request half-size capture
//! stats          print delivery statistics
//! quit           disconnect and exit
//! ```

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerCommand {
    Fps(i64),
    Quality(i64),
    Scale(f64),
    Stats,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}' (fps, quality, scale, stats, quit)")]
    Unknown(String),
    #[error("'{0}' needs a value")]
    MissingValue(&'static str),
    #[error("'{value}' is not a valid value for '{command}'")]
    BadValue { command: &'static str, value: String },
}

impl ViewerCommand {
    /// Parse one line of user input. Out-of-range numbers are accepted here;
    /// the server clamps them.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            return Err(CommandError::Empty);
        };
        let value = words.next();

        match word.to_ascii_lowercase().as_str() {
            "fps" => parse_value("fps", value).map(Self::Fps),
            "quality" | "q" => parse_value("quality", value).map(Self::Quality),
            "scale" => {
                let scale: f64 = parse_value("scale", value)?;
                if !scale.is_finite() {
                    return Err(CommandError::BadValue {
                        command: "scale",
                        value: scale.to_string(),
                    });
                }
                Ok(Self::Scale(scale))
            }
            "stats" => Ok(Self::Stats),
            "quit" | "exit" => Ok(Self::Quit),
            _ => Err(CommandError::Unknown(word.to_string())),
        }
    }
}

fn parse_value<T: std::str::FromStr>(
    command: &'static str,
    value: Option<&str>,
) -> Result<T, CommandError> {
    let value = value.ok_or(CommandError::MissingValue(command))?;
    value.parse().map_err(|_| CommandError::BadValue {
        command,
        value: value.to_string(),
    })
}
