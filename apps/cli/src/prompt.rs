//! Operator input on the terminal. Reads block, so they run on tokio's
//! blocking pool.

use crate::args::parse_lat_lon;
use std::io::{self, BufRead, Write};
use survey_core::{
    AreaSource, ClassificationError, ClassificationPort, GeoPoint, MissionError, Rectangle,
    SurveyArea,
};
use tracing::warn;

const NORTHWEST_QUESTION: &str = "   TOP-LEFT (NW) corner (lat,lon): ";
const SOUTHEAST_QUESTION: &str = "   BOTTOM-RIGHT (SE) corner (lat,lon): ";
const SPACING_QUESTION: &str = "Line spacing between scan stripes (meters): ";

/// Asks the operator about each waypoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalClassifier;

impl ClassificationPort for TerminalClassifier {
    async fn ask_yes_no(&self, label: &str) -> Result<bool, ClassificationError> {
        let question = format!("\nAt {label}: Is the detected object MILITARY? (y/n): ");
        let answer = tokio::task::spawn_blocking(move || {
            let stdin = io::stdin();
            read_answer(&question, &mut stdin.lock(), &mut io::stdout())
        })
        .await
        .map_err(|err| ClassificationError(err.to_string()))?
        .map_err(|err| ClassificationError(err.to_string()))?;
        Ok(is_yes(&answer))
    }
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Survey area from the command line, prompting for whatever is missing.
/// Answers that do not parse or do not make a flyable area are asked again;
/// a closed stdin fails the request.
#[derive(Debug, Clone, Default)]
pub struct TerminalArea {
    northwest: Option<GeoPoint>,
    southeast: Option<GeoPoint>,
    spacing_m: Option<f64>,
}

impl TerminalArea {
    pub fn new(
        northwest: Option<GeoPoint>,
        southeast: Option<GeoPoint>,
        spacing_m: Option<f64>,
    ) -> Self {
        Self {
            northwest,
            southeast,
            spacing_m,
        }
    }

    /// The area when it was given completely on the command line. `None`
    /// when something is left to prompt for.
    pub fn preset(&self) -> Result<Option<SurveyArea>, MissionError> {
        match (self.northwest, self.southeast, self.spacing_m) {
            (Some(northwest), Some(southeast), Some(spacing_m)) => {
                let rectangle = Rectangle::from_corners(northwest, southeast)?;
                SurveyArea::new(rectangle, spacing_m).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Fills in the missing parts from `input`, writing prompts to `output`.
    pub fn collect<R, W>(&self, input: &mut R, output: &mut W) -> Result<SurveyArea, MissionError>
    where
        R: BufRead,
        W: Write,
    {
        if let Some(area) = self.preset().map_err(area_input)? {
            return Ok(area);
        }
        writeln!(output, "\nEnter scan area:").map_err(area_input)?;

        loop {
            let northwest = match self.northwest {
                Some(point) => point,
                None => ask_until(NORTHWEST_QUESTION, parse_lat_lon, input, output)?,
            };
            let southeast = match self.southeast {
                Some(point) => point,
                None => ask_until(SOUTHEAST_QUESTION, parse_lat_lon, input, output)?,
            };
            let rectangle = match Rectangle::from_corners(northwest, southeast) {
                Ok(rectangle) => rectangle,
                Err(err) if self.northwest.is_some() && self.southeast.is_some() => {
                    return Err(area_input(err));
                }
                Err(err) => {
                    warn!("{err}, enter the corners again");
                    continue;
                }
            };

            let spacing_m = match self.spacing_m {
                Some(spacing) => spacing,
                None => ask_until(SPACING_QUESTION, parse_spacing, input, output)?,
            };
            match SurveyArea::new(rectangle, spacing_m) {
                Ok(area) => return Ok(area),
                Err(err) => warn!("{err}, enter the area again"),
            }
        }
    }
}

impl AreaSource for TerminalArea {
    async fn request_area(&self) -> Result<SurveyArea, MissionError> {
        let area = self.clone();
        tokio::task::spawn_blocking(move || {
            let stdin = io::stdin();
            area.collect(&mut stdin.lock(), &mut io::stdout())
        })
        .await
        .map_err(area_input)?
    }
}

fn area_input(err: impl std::fmt::Display) -> MissionError {
    MissionError::AreaInput(err.to_string())
}

fn parse_spacing(input: &str) -> Result<f64, String> {
    let spacing: f64 = input
        .trim()
        .parse()
        .map_err(|_| format!("invalid spacing `{}`", input.trim()))?;
    if !spacing.is_finite() || spacing <= 0.0 {
        return Err(format!("spacing must be positive, got {spacing}"));
    }
    Ok(spacing)
}

fn ask_until<T, R, W>(
    question: &str,
    parse: impl Fn(&str) -> Result<T, String>,
    input: &mut R,
    output: &mut W,
) -> Result<T, MissionError>
where
    R: BufRead,
    W: Write,
{
    loop {
        let answer = read_answer(question, input, output).map_err(area_input)?;
        match parse(&answer) {
            Ok(value) => return Ok(value),
            Err(err) => warn!("{err}, try again"),
        }
    }
}

fn read_answer<R, W>(question: &str, input: &mut R, output: &mut W) -> io::Result<String>
where
    R: BufRead,
    W: Write,
{
    output.write_all(question.as_bytes())?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
    }
    Ok(line.trim().to_string())
}
