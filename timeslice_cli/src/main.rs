//! Extract a time subsample of a Zarr V2 hierarchy.

use std::{num::NonZeroU64, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use timeslice::{extract_subsample, SubsampleConfig};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "timeslice")]
#[command(about = "Copy the time steps at the requested timestamps from a Zarr V2 hierarchy")]
struct Args {
    /// Path to the source hierarchy
    #[arg(required_unless_present = "config")]
    source: Option<PathBuf>,

    /// Path to the destination hierarchy, replaced if it exists
    #[arg(required_unless_present = "config")]
    destination: Option<PathBuf>,

    /// Requested timestamps, YYYY-MM-DDTHH:MM:SS
    #[arg(required_unless_present = "config")]
    timestamps: Vec<String>,

    /// Name of the time coordinate array
    #[arg(long, default_value = "time")]
    time_coordinate: String,

    /// An array which is not copied
    #[arg(long = "exclude", value_name = "NAME")]
    excluded_arrays: Vec<String>,

    /// A validity mask array, every requested time step must be valid
    #[arg(long = "mask", value_name = "NAME")]
    validity_masks: Vec<String>,

    /// The chunk shape of a destination array
    #[arg(long = "chunks", value_name = "NAME=A,B,C", value_parser = parse_chunk_override)]
    chunk_overrides: Vec<(String, Vec<NonZeroU64>)>,

    /// A JSON configuration file, other arguments are ignored
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

type Result<T> = std::result::Result<T, anyhow::Error>;

fn parse_chunk_override(value: &str) -> std::result::Result<(String, Vec<NonZeroU64>), String> {
    let (name, chunk_shape) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=A,B,C, got {value:?}"))?;
    let chunk_shape = chunk_shape
        .split(',')
        .map(|size| {
            size.trim()
                .parse::<NonZeroU64>()
                .map_err(|err| format!("invalid chunk size {size:?}: {err}"))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((name.to_string(), chunk_shape))
}

impl Args {
    fn into_config(self) -> Result<SubsampleConfig> {
        if let Some(path) = self.config {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            return SubsampleConfig::from_json(&json)
                .with_context(|| format!("parsing {}", path.display()));
        }
        let (Some(source), Some(destination)) = (self.source, self.destination) else {
            anyhow::bail!("a source and destination are required without --config");
        };
        let config = SubsampleConfig::new(source, destination, self.timestamps)
            .with_time_coordinate(self.time_coordinate)
            .with_excluded_arrays(self.excluded_arrays)
            .with_validity_masks(self.validity_masks);
        Ok(self
            .chunk_overrides
            .into_iter()
            .fold(config, |config, (name, chunk_shape)| {
                config.with_chunk_override(name, chunk_shape)
            }))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = Args::parse().into_config()?;
    log::debug!("{}", serde_json::to_string(&config)?);

    let report = extract_subsample(&config)?;
    log::info!(
        "gathered {} arrays at offsets {:?}, copied {} static arrays, excluded {}",
        report.gathered().len(),
        report.offsets(),
        report.copied().len(),
        report.excluded().len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_override() {
        let (name, chunk_shape) = parse_chunk_override("temp=1, 10,10").unwrap();
        assert_eq!(name, "temp");
        assert_eq!(
            chunk_shape.iter().map(|c| c.get()).collect::<Vec<_>>(),
            vec![1, 10, 10]
        );
        assert!(parse_chunk_override("temp").is_err());
        assert!(parse_chunk_override("temp=1,0").is_err());
    }

    #[test]
    fn args_into_config() {
        let args = Args::parse_from([
            "timeslice",
            "cwa.zarr",
            "subset.zarr",
            "2021-09-12T00:00:00",
            "2021-09-12T06:00:00",
            "--exclude",
            "XTIME",
            "--mask",
            "era5_valid",
            "--mask",
            "cwb_valid",
            "--chunks",
            "temp=1,10,10",
        ]);
        let config = args.into_config().unwrap();
        assert_eq!(config.requested_timestamps.len(), 2);
        assert_eq!(config.time_coordinate, "time");
        assert!(config.excluded_arrays.contains("XTIME"));
        assert_eq!(config.validity_masks, vec!["era5_valid", "cwb_valid"]);
        assert_eq!(config.chunk_overrides["temp"].len(), 3);
    }

    #[test]
    fn args_require_source() {
        assert!(Args::try_parse_from(["timeslice"]).is_err());
        assert!(Args::try_parse_from(["timeslice", "--config", "subset.json"]).is_ok());
    }
}
