//! Filter snapshot submitted to the external mining engine.
//!
//! The graph components never look inside a [`FilterConfig`]; it is only
//! the input contract of the engine invocation.

use crate::CoreError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightMetric {
    #[default]
    Cases,
    MeanTime,
}

impl WeightMetric {
    pub fn as_arg(&self) -> &'static str {
        match self {
            WeightMetric::Cases => "cases",
            WeightMetric::MeanTime => "mean_time",
        }
    }
}

impl FromStr for WeightMetric {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cases" => Ok(WeightMetric::Cases),
            "mean_time" => Ok(WeightMetric::MeanTime),
            other => Err(CoreError::InvalidWeightMetric(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeUnit {
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "m")]
    Minutes,
    #[serde(rename = "h")]
    Hours,
    #[default]
    #[serde(rename = "d")]
    Days,
    #[serde(rename = "w")]
    Weeks,
}

impl TimeUnit {
    pub fn code(&self) -> &'static str {
        match self {
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "m",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
            TimeUnit::Weeks => "w",
        }
    }

    pub fn seconds(&self) -> u64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Minutes => 60,
            TimeUnit::Hours => 3_600,
            TimeUnit::Days => 86_400,
            TimeUnit::Weeks => 604_800,
        }
    }
}

impl FromStr for TimeUnit {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s" => Ok(TimeUnit::Seconds),
            "m" => Ok(TimeUnit::Minutes),
            "h" => Ok(TimeUnit::Hours),
            "d" => Ok(TimeUnit::Days),
            "w" => Ok(TimeUnit::Weeks),
            other => Err(CoreError::InvalidTimeUnit(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Pkl,
}

impl FileFormat {
    pub fn as_arg(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Pkl => "pkl",
        }
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, CoreError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        ext.parse()
    }
}

impl FromStr for FileFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(FileFormat::Csv),
            "pkl" => Ok(FileFormat::Pkl),
            other => Err(CoreError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// Immutable filter snapshot. Bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub date_range: Option<DateRange>,
    pub min_cases: Option<u64>,
    pub max_cases: Option<u64>,
    /// Mean transition duration lower bound, in seconds.
    pub min_mean_seconds: Option<u64>,
    pub max_mean_seconds: Option<u64>,
    pub weight_metric: WeightMetric,
    pub time_unit: TimeUnit,
}

impl FilterConfig {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            date_range: Some(DateRange { start, end }),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let range = self.date_range.ok_or(CoreError::MissingDateRange)?;
        if range.start > range.end {
            return Err(CoreError::InvertedDateRange {
                start: range.start.to_string(),
                end: range.end.to_string(),
            });
        }
        if let (Some(min), Some(max)) = (self.min_cases, self.max_cases)
            && min > max
        {
            return Err(CoreError::InvertedBounds {
                field: "case count",
                min: min.to_string(),
                max: max.to_string(),
            });
        }
        if let (Some(min), Some(max)) = (self.min_mean_seconds, self.max_mean_seconds)
            && min > max
        {
            return Err(CoreError::InvertedBounds {
                field: "mean duration",
                min: min.to_string(),
                max: max.to_string(),
            });
        }
        Ok(())
    }

    /// Render the engine's command-line contract for this snapshot.
    pub fn to_engine_args(&self, input: &Path, format: FileFormat) -> Result<Vec<String>, CoreError> {
        self.validate()?;
        let mut args = vec![
            "--format".to_string(),
            format.as_arg().to_string(),
            "--input-path".to_string(),
            input.to_string_lossy().to_string(),
        ];
        if let Some(range) = self.date_range {
            args.push("--start-date".to_string());
            args.push(range.start.format("%Y-%m-%d").to_string());
            args.push("--end-date".to_string());
            args.push(range.end.format("%Y-%m-%d").to_string());
        }
        let optional = [
            ("--min-cases", self.min_cases),
            ("--max-cases", self.max_cases),
            ("--min-mean-time", self.min_mean_seconds),
            ("--max-mean-time", self.max_mean_seconds),
        ];
        for (flag, value) in optional {
            if let Some(value) = value {
                args.push(flag.to_string());
                args.push(value.to_string());
            }
        }
        args.push("--weight-metric".to_string());
        args.push(self.weight_metric.as_arg().to_string());
        args.push("--time-unit".to_string());
        args.push(self.time_unit.code().to_string());
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_validate_requires_date_range() {
        let cfg = FilterConfig::default();
        assert_eq!(cfg.validate(), Err(CoreError::MissingDateRange));
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let mut cfg = FilterConfig::new(date(2024, 1, 1), date(2024, 2, 1));
        cfg.min_cases = Some(10);
        cfg.max_cases = Some(5);
        assert!(matches!(
            cfg.validate(),
            Err(CoreError::InvertedBounds { field: "case count", .. })
        ));

        let cfg = FilterConfig::new(date(2024, 3, 1), date(2024, 2, 1));
        assert!(matches!(cfg.validate(), Err(CoreError::InvertedDateRange { .. })));
    }

    #[test]
    fn test_engine_args_include_optional_bounds() {
        let mut cfg = FilterConfig::new(date(2024, 1, 1), date(2024, 1, 31));
        cfg.min_cases = Some(3);
        cfg.weight_metric = WeightMetric::MeanTime;
        cfg.time_unit = TimeUnit::Hours;

        let args = cfg
            .to_engine_args(Path::new("/data/log.csv"), FileFormat::Csv)
            .unwrap();
        assert_eq!(
            args,
            vec![
                "--format",
                "csv",
                "--input-path",
                "/data/log.csv",
                "--start-date",
                "2024-01-01",
                "--end-date",
                "2024-01-31",
                "--min-cases",
                "3",
                "--weight-metric",
                "mean_time",
                "--time-unit",
                "h",
            ]
        );
    }

    #[test]
    fn test_file_format_from_path() {
        assert_eq!(FileFormat::from_path(Path::new("a/b.CSV")), Ok(FileFormat::Csv));
        assert_eq!(FileFormat::from_path(Path::new("x.pkl")), Ok(FileFormat::Pkl));
        assert!(FileFormat::from_path(Path::new("x.xlsx")).is_err());
    }
}
