use std::str::FromStr;

use foundation::{Point, SpatialReference};

use crate::controller::DisplayEvent;

pub const HELP: &str = "\
commands:
  arm | disarm | toggle      enable or disable observer placement
  click <x> <y> [z]          place the observer and run a viewshed
  distance <meters>          maximum viewshed distance for the next click
  offset <meters>            observer height above the surface
  status                     show tool and job state
  help                       show this text
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Arm,
    Disarm,
    Toggle,
    Click { x: f64, y: f64, z: Option<f64> },
    Distance(f64),
    Offset(f64),
    Status,
    Help,
    Quit,
}

impl Command {
    /// Map point for a `Click`, in the session's spatial reference.
    pub fn click_point(&self, sr: SpatialReference) -> Option<Point> {
        match *self {
            Command::Click { x, y, z } => {
                let point = Point::new(x, y, sr);
                Some(match z {
                    Some(z) => point.with_z(z),
                    None => point,
                })
            }
            _ => None,
        }
    }
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err("empty command".to_string());
        };
        let args: Vec<&str> = words.collect();
        let number = |raw: &str| {
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| format!("'{raw}' is not a number"))
        };

        let command = match (head.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("arm", []) => Command::Arm,
            ("disarm", []) => Command::Disarm,
            ("toggle", []) => Command::Toggle,
            ("click", [x, y]) => Command::Click {
                x: number(*x)?,
                y: number(*y)?,
                z: None,
            },
            ("click", [x, y, z]) => Command::Click {
                x: number(*x)?,
                y: number(*y)?,
                z: Some(number(*z)?),
            },
            ("distance", [meters]) => Command::Distance(number(*meters)?),
            ("offset", [meters]) => Command::Offset(number(*meters)?),
            ("status", []) => Command::Status,
            ("help" | "?", []) => Command::Help,
            ("quit" | "exit", []) => Command::Quit,
            (other, _) => return Err(format!("unrecognized command '{other}'; try 'help'")),
        };
        Ok(command)
    }
}

/// Text for one display event; `None` when there is nothing to print.
pub fn format_event(event: &DisplayEvent) -> Option<String> {
    match event {
        DisplayEvent::Status(text) => {
            let text = text.to_string();
            (!text.is_empty()).then(|| format!("[status] {text}"))
        }
        DisplayEvent::FeatureInfo(Some(info)) => Some(format!("[viewshed] {info}")),
        DisplayEvent::FeatureInfo(None) => None,
    }
}

pub fn print_event(event: &DisplayEvent) {
    if let Some(line) = format_event(event) {
        println!("{line}");
    }
}
